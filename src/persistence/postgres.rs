//! PostgreSQL implementation of the store traits.
//!
//! Multi-row operations run inside one `sqlx` transaction. Wallet and
//! stock debits are single conditional `UPDATE`s, so the check and the
//! write cannot be separated by a concurrent request. When two wallets are
//! touched, their rows are locked in id order first.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use super::models::{
    INTERACTION_COLUMNS, InteractionRow, KERMESSE_COLUMNS, KermesseRow, STAND_COLUMNS, StandRow,
    TICKET_COLUMNS, TOMBOLA_COLUMNS, TicketRow, TombolaRow, USER_COLUMNS, UserRow,
};
use super::{InteractionStore, KermesseStore, StandStore, TombolaStore, UserStore};
use crate::config::AppConfig;
use crate::domain::{
    Interaction, InteractionFilter, InteractionId, InteractionKind, InteractionPlan, Kermesse,
    KermesseId, KermesseScope, NewKermesse, NewStand, NewTombola, NewUser, Role, Stand, StandFilter,
    StandId, StandUpdate, Status, Ticket, TicketId, TicketScope, Tombola, TombolaDraw, TombolaId,
    TombolaUpdate, User, UserId, WinnerPicker,
};
use crate::error::ApiError;

const STARTED: &str = Status::Started.as_str();
const ENDED: &str = Status::Ended.as_str();

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Persistence`] when the database is unreachable.
    pub async fn connect(config: &AppConfig) -> Result<Self, ApiError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns the migrator error when a migration fails or the applied
    /// history diverges from the bundled files.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

// ── Transaction helpers ─────────────────────────────────────────────────

/// Locks the given user rows in id order so that concurrent transfers
/// between the same two wallets cannot deadlock.
async fn lock_users(conn: &mut PgConnection, users: &[UserId]) -> Result<(), ApiError> {
    let mut ids: Vec<i64> = users.iter().map(|u| u.get()).collect();
    ids.sort_unstable();
    ids.dedup();
    let locked: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(ids.as_slice())
            .fetch_all(&mut *conn)
            .await?;
    if let Some(missing) = ids.iter().find(|id| !locked.contains(id)) {
        return Err(ApiError::not_found("user", missing));
    }
    Ok(())
}

/// Debits `amount` tokens only if the wallet covers it.
async fn debit(conn: &mut PgConnection, user: UserId, amount: i64) -> Result<(), ApiError> {
    let done =
        sqlx::query("UPDATE users SET balance = balance - $1 WHERE id = $2 AND balance >= $1")
            .bind(amount)
            .bind(user.get())
            .execute(&mut *conn)
            .await?;
    if done.rows_affected() == 1 {
        return Ok(());
    }
    let query = "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)";
    if row_exists(conn, query, user.get()).await? {
        Err(ApiError::InsufficientTokens)
    } else {
        Err(ApiError::not_found("user", user))
    }
}

async fn credit(conn: &mut PgConnection, user: UserId, amount: i64) -> Result<(), ApiError> {
    let done = sqlx::query("UPDATE users SET balance = balance + $1 WHERE id = $2")
        .bind(amount)
        .bind(user.get())
        .execute(&mut *conn)
        .await?;
    if done.rows_affected() == 1 {
        Ok(())
    } else {
        Err(ApiError::not_found("user", user))
    }
}

/// Takes `quantity` units out of stock only if enough are left.
async fn take_stock(
    conn: &mut PgConnection,
    stand: StandId,
    quantity: i64,
) -> Result<(), ApiError> {
    let done = sqlx::query("UPDATE stands SET stock = stock - $1 WHERE id = $2 AND stock >= $1")
        .bind(quantity)
        .bind(stand.get())
        .execute(&mut *conn)
        .await?;
    if done.rows_affected() == 1 {
        return Ok(());
    }
    let query = "SELECT EXISTS (SELECT 1 FROM stands WHERE id = $1)";
    if row_exists(conn, query, stand.get()).await? {
        Err(ApiError::InsufficientStock)
    } else {
        Err(ApiError::not_found("stand", stand))
    }
}

async fn row_exists(conn: &mut PgConnection, query: &str, id: i64) -> Result<bool, ApiError> {
    let exists: bool = sqlx::query_scalar(query)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// Reads and locks a kermesse's status for the rest of the transaction.
async fn lock_kermesse_status(conn: &mut PgConnection, id: KermesseId) -> Result<Status, ApiError> {
    let status: Option<String> =
        sqlx::query_scalar("SELECT status FROM kermesses WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *conn)
            .await?;
    let status = status.ok_or_else(|| ApiError::not_found("kermesse", id))?;
    status.parse().map_err(ApiError::Persistence)
}

/// Share-locks a kermesse row and rejects it unless it is still started.
/// Concurrent purchases proceed side by side; `end_kermesse` waits for them.
async fn share_started_kermesse(conn: &mut PgConnection, id: KermesseId) -> Result<(), ApiError> {
    let status: Option<String> =
        sqlx::query_scalar("SELECT status FROM kermesses WHERE id = $1 FOR SHARE")
            .bind(id.get())
            .fetch_optional(&mut *conn)
            .await?;
    let status: Status = status
        .ok_or_else(|| ApiError::not_found("kermesse", id))?
        .parse()
        .map_err(ApiError::Persistence)?;
    if status.is_ended() {
        return Err(ApiError::InvalidState("kermesse has already ended".to_string()));
    }
    Ok(())
}

fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>, ApiError>
where
    T: TryFrom<R, Error = ApiError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ── Users / wallet ledger ───────────────────────────────────────────────

#[async_trait]
impl UserStore for PostgresStore {
    async fn create_user(&self, new: NewUser) -> Result<User, ApiError> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (parent_id, name, email, role) VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(new.parent_id.map(UserId::get))
        .bind(&new.name)
        .bind(&new.email)
        .bind(new.role.as_str())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, ApiError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn list_children(&self, parent: UserId) -> Result<Vec<User>, ApiError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE parent_id = $1 ORDER BY id"
        ))
        .bind(parent.get())
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn adjust_balance(&self, id: UserId, delta: i64) -> Result<User, ApiError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users SET balance = balance + $1 WHERE id = $2 AND balance + $1 >= 0 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(delta)
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => row.try_into(),
            None => match self.find_user(id).await? {
                Some(_) => Err(ApiError::InsufficientTokens),
                None => Err(ApiError::not_found("user", id)),
            },
        }
    }

    async fn transfer_balance(
        &self,
        from: UserId,
        to: UserId,
        amount: i64,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;
        lock_users(&mut tx, &[from, to]).await?;
        debit(&mut tx, from, amount).await?;
        credit(&mut tx, to, amount).await?;
        tx.commit().await?;
        Ok(())
    }
}

// ── Stand inventory ─────────────────────────────────────────────────────

#[async_trait]
impl StandStore for PostgresStore {
    async fn create_stand(&self, new: NewStand) -> Result<Stand, ApiError> {
        let row: StandRow = sqlx::query_as(&format!(
            "INSERT INTO stands (owner_id, name, description, kind, price, stock) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {STAND_COLUMNS}"
        ))
        .bind(new.owner_id.get())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.kind.as_str())
        .bind(new.price)
        .bind(new.stock)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn find_stand(&self, id: StandId) -> Result<Option<Stand>, ApiError> {
        let row: Option<StandRow> =
            sqlx::query_as(&format!("SELECT {STAND_COLUMNS} FROM stands WHERE id = $1"))
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await?;
        row.map(Stand::try_from).transpose()
    }

    async fn find_stand_by_owner(&self, owner: UserId) -> Result<Option<Stand>, ApiError> {
        let row: Option<StandRow> = sqlx::query_as(&format!(
            "SELECT {STAND_COLUMNS} FROM stands WHERE owner_id = $1 ORDER BY id LIMIT 1"
        ))
        .bind(owner.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Stand::try_from).transpose()
    }

    async fn update_stand(&self, id: StandId, update: StandUpdate) -> Result<Stand, ApiError> {
        let row: Option<StandRow> = sqlx::query_as(&format!(
            "UPDATE stands SET name = $1, description = $2, price = $3, stock = $4 \
             WHERE id = $5 RETURNING {STAND_COLUMNS}"
        ))
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.price)
        .bind(update.stock)
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| ApiError::not_found("stand", id))?.try_into()
    }

    async fn list_stands(&self, filter: StandFilter) -> Result<Vec<Stand>, ApiError> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT s.id, s.owner_id, s.name, s.description, s.kind, s.price, s.stock \
             FROM stands s WHERE TRUE",
        );
        if let Some(kermesse) = filter.kermesse_id {
            query
                .push(
                    " AND EXISTS (SELECT 1 FROM kermesses_stands ks \
                     WHERE ks.stand_id = s.id AND ks.kermesse_id = ",
                )
                .push_bind(kermesse.get())
                .push(")");
        }
        if let Some(is_free) = filter.is_free {
            query
                .push(if is_free { " AND NOT EXISTS" } else { " AND EXISTS" })
                .push(
                    " (SELECT 1 FROM kermesses_stands ks JOIN kermesses k ON k.id = ks.kermesse_id \
                     WHERE ks.stand_id = s.id AND k.status = ",
                )
                .push_bind(STARTED)
                .push(")");
        }
        query.push(" ORDER BY s.id");

        let rows: Vec<StandRow> = query
            .build_query_as::<StandRow>()
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }
}

// ── Kermesse lifecycle ──────────────────────────────────────────────────

#[async_trait]
impl KermesseStore for PostgresStore {
    async fn create_kermesse(&self, new: NewKermesse) -> Result<Kermesse, ApiError> {
        let row: KermesseRow = sqlx::query_as(&format!(
            "INSERT INTO kermesses (owner_id, name, description, status) VALUES ($1, $2, $3, $4) \
             RETURNING {KERMESSE_COLUMNS}"
        ))
        .bind(new.owner_id.get())
        .bind(&new.name)
        .bind(&new.description)
        .bind(STARTED)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn find_kermesse(&self, id: KermesseId) -> Result<Option<Kermesse>, ApiError> {
        let row: Option<KermesseRow> =
            sqlx::query_as(&format!("SELECT {KERMESSE_COLUMNS} FROM kermesses WHERE id = $1"))
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await?;
        row.map(Kermesse::try_from).transpose()
    }

    async fn update_kermesse(
        &self,
        id: KermesseId,
        name: String,
        description: String,
    ) -> Result<Kermesse, ApiError> {
        let row: Option<KermesseRow> = sqlx::query_as(&format!(
            "UPDATE kermesses SET name = $1, description = $2 WHERE id = $3 AND status = $4 \
             RETURNING {KERMESSE_COLUMNS}"
        ))
        .bind(&name)
        .bind(&description)
        .bind(id.get())
        .bind(STARTED)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = row {
            return row.try_into();
        }
        match self.find_kermesse(id).await? {
            Some(_) => Err(ApiError::InvalidState("kermesse has already ended".to_string())),
            None => Err(ApiError::not_found("kermesse", id)),
        }
    }

    async fn list_kermesses(&self, scope: KermesseScope) -> Result<Vec<Kermesse>, ApiError> {
        let (condition, user) = match scope {
            KermesseScope::OwnedBy(user) => ("owner_id = $1", user),
            KermesseScope::ParticipatedBy(user) => (
                "id IN (SELECT kermesse_id FROM kermesses_users WHERE user_id = $1)",
                user,
            ),
            KermesseScope::HostingStandsOf(user) => (
                "id IN (SELECT ks.kermesse_id FROM kermesses_stands ks \
                 JOIN stands s ON s.id = ks.stand_id WHERE s.owner_id = $1)",
                user,
            ),
        };
        let rows: Vec<KermesseRow> = sqlx::query_as(&format!(
            "SELECT {KERMESSE_COLUMNS} FROM kermesses WHERE {condition} ORDER BY id"
        ))
        .bind(user.get())
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn list_invitable_children(&self, id: KermesseId) -> Result<Vec<User>, ApiError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.role = $1 AND NOT EXISTS \
             (SELECT 1 FROM kermesses_users ku WHERE ku.user_id = u.id AND ku.kermesse_id = $2) \
             ORDER BY u.id"
        ))
        .bind(Role::Child.as_str())
        .bind(id.get())
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn add_participants(&self, id: KermesseId, users: &[UserId]) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;
        if lock_kermesse_status(&mut tx, id).await?.is_ended() {
            return Err(ApiError::InvalidState("kermesse has already ended".to_string()));
        }
        for user in users {
            sqlx::query(
                "INSERT INTO kermesses_users (kermesse_id, user_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(id.get())
            .bind(user.get())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn is_active_participant(&self, id: KermesseId, user: UserId) -> Result<bool, ApiError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM kermesses_users ku \
             JOIN kermesses k ON k.id = ku.kermesse_id \
             WHERE ku.kermesse_id = $1 AND ku.user_id = $2 AND k.status = $3)",
        )
        .bind(id.get())
        .bind(user.get())
        .bind(STARTED)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn stand_is_taken(&self, stand: StandId, except: KermesseId) -> Result<bool, ApiError> {
        let mut conn = self.pool.acquire().await?;
        stand_taken_elsewhere(&mut conn, stand, except).await
    }

    async fn attach_stand(&self, id: KermesseId, stand: StandId) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;
        if lock_kermesse_status(&mut tx, id).await?.is_ended() {
            return Err(ApiError::InvalidState("kermesse has already ended".to_string()));
        }
        let locked: Option<i64> =
            sqlx::query_scalar("SELECT id FROM stands WHERE id = $1 FOR UPDATE")
                .bind(stand.get())
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(ApiError::not_found("stand", stand));
        }
        if stand_taken_elsewhere(&mut tx, stand, id).await? {
            return Err(ApiError::InvalidState("stand already taken".to_string()));
        }
        sqlx::query(
            "INSERT INTO kermesses_stands (kermesse_id, stand_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(id.get())
        .bind(stand.get())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn active_kermesse_for(
        &self,
        user: UserId,
        stand: StandId,
    ) -> Result<Option<KermesseId>, ApiError> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT ku.kermesse_id FROM kermesses_users ku \
             JOIN kermesses_stands ks ON ks.kermesse_id = ku.kermesse_id \
             JOIN kermesses k ON k.id = ku.kermesse_id \
             WHERE ku.user_id = $1 AND ks.stand_id = $2 AND k.status = $3 \
             ORDER BY ku.kermesse_id LIMIT 1",
        )
        .bind(user.get())
        .bind(stand.get())
        .bind(STARTED)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id.map(KermesseId::new))
    }

    async fn has_open_tombola(&self, id: KermesseId) -> Result<bool, ApiError> {
        let mut conn = self.pool.acquire().await?;
        open_tombola_exists(&mut conn, id).await
    }

    async fn end_kermesse(&self, id: KermesseId) -> Result<Kermesse, ApiError> {
        let mut tx = self.pool.begin().await?;
        if lock_kermesse_status(&mut tx, id).await?.is_ended() {
            return Err(ApiError::InvalidState("kermesse has already ended".to_string()));
        }
        if open_tombola_exists(&mut tx, id).await? {
            return Err(ApiError::InvalidState(
                "kermesse cannot end while a tombola is in progress".to_string(),
            ));
        }
        let row: KermesseRow = sqlx::query_as(&format!(
            "UPDATE kermesses SET status = $1 WHERE id = $2 RETURNING {KERMESSE_COLUMNS}"
        ))
        .bind(ENDED)
        .bind(id.get())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        row.try_into()
    }
}

async fn stand_taken_elsewhere(
    conn: &mut PgConnection,
    stand: StandId,
    except: KermesseId,
) -> Result<bool, ApiError> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM kermesses_stands ks \
         JOIN kermesses k ON k.id = ks.kermesse_id \
         WHERE ks.stand_id = $1 AND k.status = $2 AND k.id <> $3)",
    )
    .bind(stand.get())
    .bind(STARTED)
    .bind(except.get())
    .fetch_one(&mut *conn)
    .await?;
    Ok(taken)
}

async fn open_tombola_exists(conn: &mut PgConnection, id: KermesseId) -> Result<bool, ApiError> {
    let open: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM tombolas WHERE kermesse_id = $1 AND status = $2)",
    )
    .bind(id.get())
    .bind(STARTED)
    .fetch_one(&mut *conn)
    .await?;
    Ok(open)
}

// ── Interactions ────────────────────────────────────────────────────────

#[async_trait]
impl InteractionStore for PostgresStore {
    async fn create_interaction(&self, plan: InteractionPlan) -> Result<Interaction, ApiError> {
        let mut tx = self.pool.begin().await?;

        share_started_kermesse(&mut tx, plan.kermesse_id).await?;
        if let Some(quantity) = plan.quantity {
            take_stock(&mut tx, plan.stand_id, quantity).await?;
        }
        lock_users(&mut tx, &[plan.user_id, plan.stand_owner_id]).await?;
        debit(&mut tx, plan.user_id, plan.tokens).await?;
        credit(&mut tx, plan.stand_owner_id, plan.tokens).await?;

        let status = match plan.kind {
            InteractionKind::Activity => Some(STARTED),
            InteractionKind::Transaction => None,
        };
        let row: InteractionRow = sqlx::query_as(&format!(
            "INSERT INTO interactions (user_id, stand_id, kermesse_id, kind, status, tokens) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {INTERACTION_COLUMNS}"
        ))
        .bind(plan.user_id.get())
        .bind(plan.stand_id.get())
        .bind(plan.kermesse_id.get())
        .bind(plan.kind.as_str())
        .bind(status)
        .bind(plan.tokens)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn find_interaction(&self, id: InteractionId) -> Result<Option<Interaction>, ApiError> {
        let row: Option<InteractionRow> = sqlx::query_as(&format!(
            "SELECT {INTERACTION_COLUMNS} FROM interactions WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Interaction::try_from).transpose()
    }

    async fn grade_interaction(
        &self,
        id: InteractionId,
        points: i64,
    ) -> Result<Interaction, ApiError> {
        let row: Option<InteractionRow> = sqlx::query_as(&format!(
            "UPDATE interactions SET status = $1, points = $2 WHERE id = $3 \
             RETURNING {INTERACTION_COLUMNS}"
        ))
        .bind(ENDED)
        .bind(points)
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| ApiError::not_found("interaction", id))?
            .try_into()
    }

    async fn list_interactions(
        &self,
        filter: InteractionFilter,
    ) -> Result<Vec<Interaction>, ApiError> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT i.id, i.user_id, i.stand_id, i.kermesse_id, i.kind, i.status, i.tokens, \
             i.points, i.created_at \
             FROM interactions i \
             JOIN users u ON u.id = i.user_id \
             JOIN stands s ON s.id = i.stand_id \
             WHERE TRUE",
        );
        if let Some(kermesse) = filter.kermesse_id {
            query.push(" AND i.kermesse_id = ").push_bind(kermesse.get());
        }
        if let Some(user) = filter.user_id {
            query.push(" AND i.user_id = ").push_bind(user.get());
        }
        if let Some(parent) = filter.family_of {
            query
                .push(" AND (u.id = ")
                .push_bind(parent.get())
                .push(" OR u.parent_id = ")
                .push_bind(parent.get())
                .push(")");
        }
        if let Some(owner) = filter.stand_owner_id {
            query.push(" AND s.owner_id = ").push_bind(owner.get());
        }
        query.push(" ORDER BY i.created_at DESC, i.id DESC");

        let rows: Vec<InteractionRow> = query
            .build_query_as::<InteractionRow>()
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }
}

// ── Tombolas and tickets ────────────────────────────────────────────────

#[async_trait]
impl TombolaStore for PostgresStore {
    async fn create_tombola(&self, new: NewTombola) -> Result<Tombola, ApiError> {
        let mut tx = self.pool.begin().await?;
        if lock_kermesse_status(&mut tx, new.kermesse_id).await?.is_ended() {
            return Err(ApiError::InvalidState("kermesse has already ended".to_string()));
        }
        let row: TombolaRow = sqlx::query_as(&format!(
            "INSERT INTO tombolas (kermesse_id, name, status, price, prize) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {TOMBOLA_COLUMNS}"
        ))
        .bind(new.kermesse_id.get())
        .bind(&new.name)
        .bind(STARTED)
        .bind(new.price)
        .bind(&new.prize)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn find_tombola(&self, id: TombolaId) -> Result<Option<Tombola>, ApiError> {
        let row: Option<TombolaRow> =
            sqlx::query_as(&format!("SELECT {TOMBOLA_COLUMNS} FROM tombolas WHERE id = $1"))
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await?;
        row.map(Tombola::try_from).transpose()
    }

    async fn update_tombola(
        &self,
        id: TombolaId,
        update: TombolaUpdate,
    ) -> Result<Tombola, ApiError> {
        let row: Option<TombolaRow> = sqlx::query_as(&format!(
            "UPDATE tombolas SET name = $1, price = $2, prize = $3 WHERE id = $4 \
             RETURNING {TOMBOLA_COLUMNS}"
        ))
        .bind(&update.name)
        .bind(update.price)
        .bind(&update.prize)
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| ApiError::not_found("tombola", id))?
            .try_into()
    }

    async fn list_tombolas(&self, kermesse: Option<KermesseId>) -> Result<Vec<Tombola>, ApiError> {
        let mut query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {TOMBOLA_COLUMNS} FROM tombolas WHERE TRUE"));
        if let Some(kermesse) = kermesse {
            query.push(" AND kermesse_id = ").push_bind(kermesse.get());
        }
        query.push(" ORDER BY id");
        let rows: Vec<TombolaRow> = query
            .build_query_as::<TombolaRow>()
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn issue_ticket(
        &self,
        user: UserId,
        tombola: TombolaId,
        price: i64,
    ) -> Result<Ticket, ApiError> {
        let mut tx = self.pool.begin().await?;

        // FOR SHARE blocks a concurrent close until this ticket is in.
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM tombolas WHERE id = $1 FOR SHARE")
                .bind(tombola.get())
                .fetch_optional(&mut *tx)
                .await?;
        let status = status.ok_or_else(|| ApiError::not_found("tombola", tombola))?;
        if status != STARTED {
            return Err(ApiError::InvalidState("tombola has already ended".to_string()));
        }

        debit(&mut tx, user, price).await?;
        let row: TicketRow = sqlx::query_as(&format!(
            "INSERT INTO tickets (user_id, tombola_id) VALUES ($1, $2) RETURNING {TICKET_COLUMNS}"
        ))
        .bind(user.get())
        .bind(tombola.get())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn close_tombola(
        &self,
        id: TombolaId,
        picker: &dyn WinnerPicker,
    ) -> Result<TombolaDraw, ApiError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<TombolaRow> = sqlx::query_as(&format!(
            "UPDATE tombolas SET status = $1 WHERE id = $2 AND status = $3 \
             RETURNING {TOMBOLA_COLUMNS}"
        ))
        .bind(ENDED)
        .bind(id.get())
        .bind(STARTED)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            let query = "SELECT EXISTS (SELECT 1 FROM tombolas WHERE id = $1)";
            let exists = row_exists(&mut tx, query, id.get()).await?;
            return Err(if exists {
                ApiError::InvalidState("tombola has already ended".to_string())
            } else {
                ApiError::not_found("tombola", id)
            });
        };
        let tombola = Tombola::try_from(row)?;

        let ticket_ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM tickets WHERE tombola_id = $1 ORDER BY id")
                .bind(id.get())
                .fetch_all(&mut *tx)
                .await?;
        let ticket_ids: Vec<TicketId> = ticket_ids.into_iter().map(TicketId::new).collect();

        let winner = match picker.pick(&ticket_ids) {
            Some(ticket) => {
                let row: TicketRow = sqlx::query_as(&format!(
                    "UPDATE tickets SET winner = TRUE WHERE id = $1 AND tombola_id = $2 \
                     RETURNING {TICKET_COLUMNS}"
                ))
                .bind(ticket.get())
                .bind(id.get())
                .fetch_one(&mut *tx)
                .await?;
                Some(Ticket::from(row))
            }
            None => None,
        };

        tx.commit().await?;
        Ok(TombolaDraw { tombola, winner })
    }

    async fn find_ticket(&self, id: TicketId) -> Result<Option<Ticket>, ApiError> {
        let row: Option<TicketRow> =
            sqlx::query_as(&format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1"))
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Ticket::from))
    }

    async fn list_tickets(&self, scope: TicketScope) -> Result<Vec<Ticket>, ApiError> {
        let (joins, condition, user) = match scope {
            TicketScope::OrganizedBy(user) => (
                "JOIN tombolas tb ON tb.id = t.tombola_id JOIN kermesses k ON k.id = tb.kermesse_id",
                "k.owner_id = $1",
                user,
            ),
            TicketScope::FamilyOf(user) => (
                "JOIN users u ON u.id = t.user_id",
                "(u.id = $1 OR u.parent_id = $1)",
                user,
            ),
            TicketScope::HeldBy(user) => ("", "t.user_id = $1", user),
        };
        let rows: Vec<TicketRow> = sqlx::query_as(&format!(
            "SELECT t.id, t.user_id, t.tombola_id, t.winner, t.created_at FROM tickets t {joins} \
             WHERE {condition} ORDER BY t.created_at DESC, t.id DESC"
        ))
        .bind(user.get())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Ticket::from).collect())
    }
}

/// These run against a throwaway database created by `sqlx::test` from
/// `DATABASE_URL`: `cargo test -- --ignored`.
#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{RandomPicker, StandKind};

    async fn user(store: &PostgresStore, email: &str, role: Role, balance: i64) -> User {
        let Ok(user) = store
            .create_user(NewUser {
                parent_id: None,
                name: email.to_string(),
                email: email.to_string(),
                role,
            })
            .await
        else {
            panic!("create user {email}");
        };
        let Ok(user) = store.adjust_balance(user.id, balance).await else {
            panic!("fund {email}");
        };
        user
    }

    async fn balance_of(store: &PostgresStore, id: UserId) -> i64 {
        let Ok(Some(user)) = store.find_user(id).await else {
            panic!("user {id} exists");
        };
        user.balance
    }

    async fn stock_of(store: &PostgresStore, id: StandId) -> i64 {
        let Ok(Some(stand)) = store.find_stand(id).await else {
            panic!("stand {id} exists");
        };
        stand.stock
    }

    /// A started kermesse with one sale stand attached.
    async fn fair(store: &PostgresStore, price: i64, stock: i64) -> (Kermesse, Stand, User) {
        let organizer = user(store, "o@example.org", Role::Organizer, 0).await;
        let holder = user(store, "h@example.org", Role::StandHolder, 0).await;
        let Ok(stand) = store
            .create_stand(NewStand {
                owner_id: holder.id,
                name: "Crêpes".to_string(),
                description: String::new(),
                kind: StandKind::Sale,
                price,
                stock,
            })
            .await
        else {
            panic!("create stand");
        };
        let Ok(kermesse) = store
            .create_kermesse(NewKermesse {
                owner_id: organizer.id,
                name: "Fête de l'école".to_string(),
                description: String::new(),
            })
            .await
        else {
            panic!("create kermesse");
        };
        let Ok(()) = store.attach_stand(kermesse.id, stand.id).await else {
            panic!("attach stand");
        };
        (kermesse, stand, holder)
    }

    fn sale(kermesse: &Kermesse, stand: &Stand, buyer: UserId, quantity: i64) -> InteractionPlan {
        InteractionPlan {
            user_id: buyer,
            stand_id: stand.id,
            stand_owner_id: stand.owner_id,
            kermesse_id: kermesse.id,
            kind: InteractionKind::Transaction,
            quantity: Some(quantity),
            tokens: quantity * stand.price,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn concurrent_debits_never_overspend(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let (kermesse, stand, holder) = fair(&store, 10, 100).await;
        let child = user(&store, "c@example.org", Role::Child, 10).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let plan = sale(&kermesse, &stand, child.id, 1);
            handles.push(tokio::spawn(async move { store.create_interaction(plan).await }));
        }
        let mut successes = 0;
        for handle in handles {
            let Ok(result) = handle.await else {
                panic!("task panicked");
            };
            match result {
                Ok(_) => successes += 1,
                Err(ApiError::InsufficientTokens) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(balance_of(&store, child.id).await, 0);
        assert_eq!(balance_of(&store, holder.id).await, 10);
        assert_eq!(stock_of(&store, stand.id).await, 99);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn short_stock_rolls_the_sale_back(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let (kermesse, stand, holder) = fair(&store, 10, 2).await;
        let child = user(&store, "c@example.org", Role::Child, 50).await;

        assert!(matches!(
            store.create_interaction(sale(&kermesse, &stand, child.id, 3)).await,
            Err(ApiError::InsufficientStock)
        ));

        assert_eq!(balance_of(&store, child.id).await, 50);
        assert_eq!(balance_of(&store, holder.id).await, 0);
        assert_eq!(stock_of(&store, stand.id).await, 2);
        let Ok(all) = store.list_interactions(InteractionFilter::default()).await else {
            panic!("list interactions");
        };
        assert!(all.is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn ended_kermesse_refuses_sales(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let (kermesse, stand, holder) = fair(&store, 10, 5).await;
        let child = user(&store, "c@example.org", Role::Child, 100).await;
        let Ok(_) = store.end_kermesse(kermesse.id).await else {
            panic!("end kermesse");
        };

        assert!(matches!(
            store.create_interaction(sale(&kermesse, &stand, child.id, 3)).await,
            Err(ApiError::InvalidState(_))
        ));
        assert_eq!(balance_of(&store, child.id).await, 100);
        assert_eq!(balance_of(&store, holder.id).await, 0);
        assert_eq!(stock_of(&store, stand.id).await, 5);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn tombola_closes_once_with_one_winner(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let (kermesse, _, _) = fair(&store, 1, 1).await;
        let child = user(&store, "c@example.org", Role::Child, 10).await;
        let Ok(tombola) = store
            .create_tombola(NewTombola {
                kermesse_id: kermesse.id,
                name: "Grand lot".to_string(),
                price: 2,
                prize: "Vélo".to_string(),
            })
            .await
        else {
            panic!("create tombola");
        };
        for _ in 0..3 {
            assert!(store.issue_ticket(child.id, tombola.id, 2).await.is_ok());
        }
        assert_eq!(balance_of(&store, child.id).await, 4);

        let first = store.close_tombola(tombola.id, &RandomPicker);
        let second = store.close_tombola(tombola.id, &RandomPicker);
        let (first, second) = tokio::join!(first, second);
        assert_eq!(u8::from(first.is_ok()) + u8::from(second.is_ok()), 1);
        let refused = [first, second].into_iter().find_map(Result::err);
        assert!(matches!(refused, Some(ApiError::InvalidState(_))));

        let Ok(tickets) = store.list_tickets(TicketScope::HeldBy(child.id)).await else {
            panic!("list tickets");
        };
        assert_eq!(tickets.len(), 3);
        assert_eq!(tickets.iter().filter(|t| t.winner).count(), 1);
        assert!(matches!(
            store.issue_ticket(child.id, tombola.id, 2).await,
            Err(ApiError::InvalidState(_))
        ));
        assert_eq!(balance_of(&store, child.id).await, 4);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn transfer_is_all_or_nothing(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let parent = user(&store, "p@example.org", Role::Parent, 30).await;
        let child = user(&store, "c@example.org", Role::Child, 0).await;

        assert!(matches!(
            store.transfer_balance(parent.id, child.id, 31).await,
            Err(ApiError::InsufficientTokens)
        ));
        assert!(matches!(
            store.transfer_balance(parent.id, UserId::new(i64::MAX), 5).await,
            Err(ApiError::NotFound(_))
        ));
        assert_eq!(balance_of(&store, parent.id).await, 30);

        let Ok(()) = store.transfer_balance(parent.id, child.id, 30).await else {
            panic!("exact transfer must succeed");
        };
        assert_eq!(balance_of(&store, parent.id).await, 0);
        assert_eq!(balance_of(&store, child.id).await, 30);
    }
}
