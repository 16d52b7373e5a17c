pub mod employee;
pub mod epidemiology;
#[cfg(test)]
pub mod memory;
pub mod profile;
pub mod repository;
pub mod unit_of_work;

#[cfg(feature = "integration-test")]
#[cfg(test)]
pub mod integration {
    use sqlx::PgPool;

    /**
     * Initialize the database connection pool.
     */
    pub async fn init_db() -> PgPool {
        dotenv::from_filename("./migrations/.env-test").ok();
        let pool = PgPool::connect(dotenv::var("DATABASE_URL").unwrap().as_str()).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }
}
