use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};

use crate::db::{unknown_assignees, Store};
use crate::error::AppError;
use crate::models::{
    NewTodo, NewUser, PublicUser, Subtask, Todo, TodoChanges, TodoFilters, TodoRow, User,
};

const TODO_COLUMNS: &str = "t.id, t.title, t.description, t.due_date, t.reminder_date, t.status, \
     t.priority, t.starred, t.creator_id, t.created_at, t.updated_at";

const USER_COLUMNS: &str = "id, username, email, password, created_at, updated_at";

const TODO_ORDER: &str = " ORDER BY t.created_at DESC, t.id DESC";

/// Assignee joined with the todo it belongs to.
#[derive(FromRow)]
struct AssigneeRow {
    todo_id: i32,
    id: i32,
    username: String,
    email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AssigneeRow> for (i32, PublicUser) {
    fn from(row: AssigneeRow) -> Self {
        (
            row.todo_id,
            PublicUser {
                id: row.id,
                username: row.username,
                email: row.email,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        )
    }
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool and brings the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Migration failed: {}", e)))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Loads creators, assignees and subtasks for `rows` in three queries, keeping the
    /// order of `rows`. Runs on `conn` so a transaction sees its own writes.
    async fn hydrate(conn: &mut PgConnection, rows: Vec<TodoRow>) -> Result<Vec<Todo>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let todo_ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let creator_ids: Vec<i32> = rows.iter().map(|r| r.creator_id).collect();

        let creators: HashMap<i32, PublicUser> = sqlx::query_as::<_, PublicUser>(
            "SELECT id, username, email, created_at, updated_at FROM users WHERE id = ANY($1)",
        )
        .bind(&creator_ids)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

        let mut assignees: HashMap<i32, Vec<PublicUser>> = HashMap::new();
        let assignee_rows = sqlx::query_as::<_, AssigneeRow>(
            "SELECT ta.todo_id, u.id, u.username, u.email, u.created_at, u.updated_at \
             FROM todo_assignees ta JOIN users u ON u.id = ta.user_id \
             WHERE ta.todo_id = ANY($1) ORDER BY u.id",
        )
        .bind(&todo_ids)
        .fetch_all(&mut *conn)
        .await?;
        for row in assignee_rows {
            let (todo_id, user) = row.into();
            assignees.entry(todo_id).or_default().push(user);
        }

        let mut subtasks: HashMap<i32, Vec<Subtask>> = HashMap::new();
        let subtask_rows = sqlx::query_as::<_, Subtask>(
            "SELECT id, title, completed, todo_id FROM subtasks WHERE todo_id = ANY($1) ORDER BY id",
        )
        .bind(&todo_ids)
        .fetch_all(&mut *conn)
        .await?;
        for subtask in subtask_rows {
            subtasks.entry(subtask.todo_id).or_default().push(subtask);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let creator = creators.get(&row.creator_id).cloned();
                let assigned_to = assignees.remove(&row.id).unwrap_or_default();
                let subs = subtasks.remove(&row.id).unwrap_or_default();
                Todo::from_parts(row, creator, assigned_to, subs)
            })
            .collect())
    }

    async fn load_todo(conn: &mut PgConnection, id: i32) -> Result<Option<Todo>, AppError> {
        let sql = format!("SELECT {} FROM todos t WHERE t.id = $1", TODO_COLUMNS);
        let row = sqlx::query_as::<_, TodoRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Self::hydrate(conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn load_written(tx: &mut Transaction<'_, Postgres>, id: i32) -> Result<Todo, AppError> {
        Self::load_todo(&mut **tx, id).await?.ok_or_else(|| {
            AppError::InternalServerError(format!("Todo {} missing inside its own transaction", id))
        })
    }

    async fn hydrate_all(&self, rows: Vec<TodoRow>) -> Result<Vec<Todo>, AppError> {
        let mut conn = self.pool.acquire().await?;
        Self::hydrate(&mut conn, rows).await
    }

    /// Fails with `BadRequest` if any id has no matching user.
    async fn check_assignees(
        tx: &mut Transaction<'_, Postgres>,
        ids: &[i32],
    ) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }

        let found: Vec<(i32,)> = sqlx::query_as("SELECT id FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&mut **tx)
            .await?;
        let found: Vec<i32> = found.into_iter().map(|(id,)| id).collect();

        unknown_assignees(ids, &found)
    }

    async fn link_assignees(
        tx: &mut Transaction<'_, Postgres>,
        todo_id: i32,
        ids: &[i32],
    ) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO todo_assignees (todo_id, user_id) \
             SELECT $1, user_id FROM UNNEST($2::int4[]) AS user_id \
             ON CONFLICT DO NOTHING",
        )
        .bind(todo_id)
        .bind(ids)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (username, email, password) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    AppError::Conflict("User with this email already exists".into())
                }
                other => other.into(),
            })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> Result<Vec<PublicUser>, AppError> {
        Ok(sqlx::query_as::<_, PublicUser>(
            "SELECT id, username, email, created_at, updated_at FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_todo(&self, todo: NewTodo, creator_id: i32) -> Result<Todo, AppError> {
        let mut tx = self.pool.begin().await?;

        Self::check_assignees(&mut tx, &todo.assigned_to).await?;

        let (todo_id,): (i32,) = sqlx::query_as(
            "INSERT INTO todos \
             (title, description, due_date, reminder_date, status, priority, starred, creator_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.due_date)
        .bind(todo.reminder_date)
        .bind(todo.status)
        .bind(todo.priority)
        .bind(todo.starred)
        .bind(creator_id)
        .fetch_one(&mut *tx)
        .await?;

        Self::link_assignees(&mut tx, todo_id, &todo.assigned_to).await?;

        for subtask in &todo.subtasks {
            sqlx::query("INSERT INTO subtasks (title, completed, todo_id) VALUES ($1, $2, $3)")
                .bind(&subtask.title)
                .bind(subtask.completed)
                .bind(todo_id)
                .execute(&mut *tx)
                .await?;
        }

        let created = Self::load_written(&mut tx, todo_id).await?;
        tx.commit().await?;

        Ok(created)
    }

    async fn get_todo_by_id(&self, id: i32) -> Result<Option<Todo>, AppError> {
        let mut conn = self.pool.acquire().await?;
        Self::load_todo(&mut conn, id).await
    }

    async fn list_todos_for_user(&self, user_id: i32) -> Result<Vec<Todo>, AppError> {
        let sql = format!(
            "SELECT {} FROM todos t WHERE t.creator_id = $1 \
             OR EXISTS (SELECT 1 FROM todo_assignees ta WHERE ta.todo_id = t.id AND ta.user_id = $1){}",
            TODO_COLUMNS, TODO_ORDER
        );
        let rows = sqlx::query_as::<_, TodoRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        self.hydrate_all(rows).await
    }

    async fn list_todos(&self, filters: &TodoFilters) -> Result<Vec<Todo>, AppError> {
        let mut sql = format!("SELECT {} FROM todos t", TODO_COLUMNS);
        let mut param_count = 1;
        let mut conditions: Vec<String> = Vec::new();

        if !filters.status.is_empty() {
            conditions.push(format!("t.status::text = ANY(${})", param_count));
            param_count += 1;
        }
        if !filters.assigned_to.is_empty() {
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM todo_assignees ta WHERE ta.todo_id = t.id AND ta.user_id = ANY(${}))",
                param_count
            ));
            param_count += 1;
        }
        if filters.starred.is_some() {
            conditions.push(format!("t.starred = ${}", param_count));
            param_count += 1;
        }
        if !filters.priority.is_empty() {
            conditions.push(format!("t.priority::text = ANY(${})", param_count));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(TODO_ORDER);

        let mut query = sqlx::query_as::<_, TodoRow>(&sql);

        if !filters.status.is_empty() {
            let status: Vec<String> = filters.status.iter().map(|s| s.as_str().to_string()).collect();
            query = query.bind(status);
        }
        if !filters.assigned_to.is_empty() {
            query = query.bind(filters.assigned_to.clone());
        }
        if let Some(starred) = filters.starred {
            query = query.bind(starred);
        }
        if !filters.priority.is_empty() {
            let priority: Vec<String> =
                filters.priority.iter().map(|p| p.as_str().to_string()).collect();
            query = query.bind(priority);
        }

        let rows = query.fetch_all(&self.pool).await?;
        self.hydrate_all(rows).await
    }

    async fn update_todo(&self, id: i32, changes: TodoChanges) -> Result<Option<Todo>, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<(i32,)> = sqlx::query_as(
            "UPDATE todos SET \
             title = COALESCE($2, title), \
             description = COALESCE($3, description), \
             due_date = COALESCE($4, due_date), \
             reminder_date = COALESCE($5, reminder_date), \
             status = COALESCE($6, status), \
             priority = COALESCE($7, priority), \
             starred = COALESCE($8, starred), \
             updated_at = NOW() \
             WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.due_date)
        .bind(changes.reminder_date)
        .bind(changes.status)
        .bind(changes.priority)
        .bind(changes.starred)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Ok(None);
        }

        if let Some(assignees) = &changes.assigned_to {
            Self::check_assignees(&mut tx, assignees).await?;

            sqlx::query("DELETE FROM todo_assignees WHERE todo_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            Self::link_assignees(&mut tx, id, assignees).await?;
        }

        let todo = Self::load_written(&mut tx, id).await?;
        tx.commit().await?;

        Ok(Some(todo))
    }

    async fn delete_todo(&self, id: i32) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await;

        match result {
            Ok(done) => {
                tx.commit().await?;
                Ok(done.rows_affected() > 0)
            }
            Err(sqlx::Error::Database(ref db)) if db.is_foreign_key_violation() => {
                log::warn!("todo {} still referenced, not deleted", id);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
