mod database;
mod error;
mod handlers;
mod middleware;
mod models;
mod policy;
mod reconcile;
mod utils;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use dotenvy::dotenv;
use std::env;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use database::{create_database_pool, Database};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    let database_url = env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set");

    let db = create_database_pool(&database_url).await
        .expect("Failed to connect to database");

    println!("Database connection successful!");

    let app = create_router(db);

    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);

    println!("🎉 Festa server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn create_router(db: Database) -> Router {
    Router::new()
        // Public routes (no authentication required)
        .route("/api/health", get(handlers::health))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))

        // Current user
        .route("/api/auth/me", get(handlers::auth::me))

        // User administration
        .route("/api/auth/users", get(handlers::auth::users_list))
        .route("/api/auth/users/:user_id", delete(handlers::auth::delete_user))
        .route("/api/auth/reset-pin/:user_id", put(handlers::auth::reset_pin))

        // Budget routes
        .route("/api/budget", post(handlers::budget::create_or_update_budget))
        .route("/api/budget", get(handlers::budget::get_budget))
        .route("/api/budget/summary", get(handlers::budget::budget_summary))
        .route("/api/budget/reconcile", post(handlers::budget::reconcile_budget))

        // Task routes
        .route("/api/tasks", post(handlers::tasks::create_task))
        .route("/api/tasks", get(handlers::tasks::tasks_list))
        .route("/api/tasks/:id", get(handlers::tasks::get_task))
        .route("/api/tasks/:id", put(handlers::tasks::update_task))
        .route("/api/tasks/:id", delete(handlers::tasks::delete_task))

        // Expense routes
        .route("/api/expenses", post(handlers::expenses::create_expense))
        .route("/api/expenses", get(handlers::expenses::expenses_list))
        .route("/api/expenses/:id", get(handlers::expenses::get_expense))
        .route("/api/expenses/:id", put(handlers::expenses::update_expense))
        .route("/api/expenses/:id/status", put(handlers::expenses::update_expense_status))
        .route("/api/expenses/:id", delete(handlers::expenses::delete_expense))

        // Dashboard routes
        .route("/api/dashboard/admin", get(handlers::dashboard::admin_dashboard))
        .route("/api/dashboard/user", get(handlers::dashboard::user_dashboard))
        .route("/api/dashboard/expense-breakdown", get(handlers::dashboard::expense_breakdown))
        .route("/api/dashboard/analytics", get(handlers::dashboard::analytics))

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
        )
        .with_state(db)
}
