//! Seeded in-memory ledger shared by the crate's tests

use crate::models::Plan;
use crate::store::LedgerStore;

pub(crate) struct LedgerFixture {
    pub store: LedgerStore,
    pub user_id: i64,
    pub team_id: i64,
    pub other_user_id: i64,
    pub other_team_id: i64,
    pub admin_id: i64,
    pub starter: Plan,
    pub premium: Plan,
}

impl LedgerFixture {
    /// Subscription of `user_id` on the STARTER plan, without any order
    pub async fn subscribe(&self) -> i64 {
        self.subscribe_to(self.starter.id).await
    }

    pub async fn subscribe_to(&self, plan_id: i64) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO subscriptions (user_id, team_id, plan_id) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(self.user_id)
        .bind(self.team_id)
        .bind(plan_id)
        .fetch_one(self.store.pool())
        .await
        .unwrap()
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(self.store.pool())
            .await
            .unwrap()
    }
}

async fn insert_user(store: &LedgerStore, email: &str, is_admin: bool) -> i64 {
    sqlx::query_scalar("INSERT INTO users (email, name, is_admin) VALUES (?, ?, ?) RETURNING id")
        .bind(email)
        .bind(email)
        .bind(is_admin)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

async fn insert_team(store: &LedgerStore, name: &str, user_id: i64) -> i64 {
    sqlx::query_scalar("INSERT INTO teams (name, user_id) VALUES (?, ?) RETURNING id")
        .bind(name)
        .bind(user_id)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

async fn insert_plan(store: &LedgerStore, name: &str, price: i64) -> Plan {
    sqlx::query_as("INSERT INTO plans (name, price) VALUES (?, ?) RETURNING id, name, price")
        .bind(name)
        .bind(price)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

/// Statuses PENDING, COMPLETED and CANCELLED, two users with one team each,
/// an admin, and the plans STARTER (30) and PREMIUM (60)
pub(crate) async fn seed_ledger() -> LedgerFixture {
    let store = LedgerStore::in_memory().await.unwrap();

    sqlx::query("INSERT INTO order_statuses (name) VALUES ('PENDING'), ('COMPLETED'), ('CANCELLED')")
        .execute(store.pool())
        .await
        .unwrap();

    let user_id = insert_user(&store, "owner@example.com", false).await;
    let other_user_id = insert_user(&store, "other@example.com", false).await;
    let admin_id = insert_user(&store, "admin@example.com", true).await;
    let team_id = insert_team(&store, "owner-team", user_id).await;
    let other_team_id = insert_team(&store, "other-team", other_user_id).await;
    let starter = insert_plan(&store, "STARTER", 30).await;
    let premium = insert_plan(&store, "PREMIUM", 60).await;

    LedgerFixture {
        store,
        user_id,
        team_id,
        other_user_id,
        other_team_id,
        admin_id,
        starter,
        premium,
    }
}
