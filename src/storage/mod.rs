mod articles;
mod schema;
mod subscriptions;
mod tokens;
mod types;

pub use schema::Database;
pub use types::{
    Article, ArticleWithSubscription, DatabaseError, NewArticle, NewSubscription, StoredToken,
    Subscription, SubscriptionSummary,
};
