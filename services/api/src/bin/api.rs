//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        tts::parse_voice, DbAdapter, InMemoryDraftStore, LocalFileStorage, OpenAiDiscussionAdapter,
        OpenAiGradingAdapter, OpenAiTranslationAdapter, OpenAiTtsAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        classes, content, functions, lessons, presentation_ws_handler, quiz_ws_handler, quizzes,
        require_auth,
        rest::{me_handler, ApiDoc},
        state::AppState,
        users,
    },
};
use async_openai::{config::OpenAIConfig, types::audio::SpeechModel, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let tts_voice = parse_voice(&config.tts_voice).ok_or_else(|| {
        ApiError::Internal(format!(
            "Invalid TTS voice specified in config: '{}'",
            config.tts_voice
        ))
    })?;
    let tts = Arc::new(OpenAiTtsAdapter::new(
        openai_client.clone(),
        SpeechModel::Tts1Hd,
        tts_voice,
    ));
    let grader = Arc::new(OpenAiGradingAdapter::new(
        openai_client.clone(),
        config.grading_model.clone(),
    ));
    let discussion = Arc::new(OpenAiDiscussionAdapter::new(
        openai_client.clone(),
        config.prompt_model.clone(),
    ));
    let translator = Arc::new(OpenAiTranslationAdapter::new(
        openai_client,
        config.translation_model.clone(),
    ));
    let storage = Arc::new(LocalFileStorage::new(
        config.storage_root.clone(),
        config.public_files_url.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        users: db_adapter.clone(),
        content: db_adapter.clone(),
        lessons: db_adapter.clone(),
        quizzes: db_adapter.clone(),
        classes: db_adapter,
        drafts: Arc::new(InMemoryDraftStore::new()),
        storage,
        grader,
        discussion,
        translator,
        tts,
    });

    // --- 5. CORS ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/me", get(me_handler))
        .route("/users", get(users::list_users_handler).post(users::create_user_handler))
        .route("/users/{id}/status", put(users::update_status_handler))
        .route("/users/{id}/password", post(users::reset_password_handler))
        .route(
            "/content",
            get(content::list_content_handler).post(content::create_content_handler),
        )
        .route(
            "/content/{id}",
            get(content::get_content_handler)
                .put(content::update_content_handler)
                .delete(content::delete_content_handler),
        )
        .route("/content/{id}/publish", post(content::toggle_publish_handler))
        .route("/content/{id}/versions", get(content::list_versions_handler))
        .route("/files", post(functions::upload_file_handler))
        .route(
            "/lessons",
            get(lessons::list_lessons_handler).post(lessons::create_lesson_handler),
        )
        .route("/lessons/{id}", get(lessons::get_lesson_handler))
        .route(
            "/lessons/{id}/components",
            get(lessons::list_components_handler).post(lessons::create_component_handler),
        )
        .route(
            "/lessons/{id}/components/order",
            put(lessons::reorder_components_handler),
        )
        .route(
            "/components/{id}",
            get(lessons::get_component_handler)
                .put(lessons::update_component_handler)
                .delete(lessons::delete_component_handler),
        )
        .route("/components/{id}/fields", post(lessons::edit_field_handler))
        .route("/components/{id}/json", post(lessons::edit_json_handler))
        .route("/components/{id}/view", get(lessons::view_component_handler))
        .route("/component-types/{tag}/editor", get(lessons::editor_handler))
        .route("/quizzes", post(quizzes::create_quiz_handler))
        .route("/quizzes/{id}", get(quizzes::get_quiz_handler))
        .route("/quizzes/{id}/questions", post(quizzes::add_question_handler))
        .route("/quizzes/{id}/attempts", get(quizzes::list_attempts_handler))
        .route("/attempts/{id}/review", get(quizzes::review_attempt_handler))
        .route(
            "/classes",
            get(classes::list_classes_handler).post(classes::create_class_handler),
        )
        .route(
            "/classes/{id}/assignments",
            get(classes::list_assignments_handler).post(classes::create_assignment_handler),
        )
        .route("/classes/{id}/gradebook", get(classes::gradebook_handler))
        .route("/dashboard", get(classes::dashboard_handler))
        .route(
            "/functions/extract-slide-text",
            post(functions::extract_slide_text_handler),
        )
        .route(
            "/functions/generate-discussion-prompt",
            post(functions::discussion_prompt_handler),
        )
        .route(
            "/functions/grade-short-answer",
            post(functions::grade_short_answer_handler),
        )
        .route("/functions/translate", post(functions::translate_handler))
        .route("/functions/speak", post(functions::speak_handler))
        .route("/ws/quiz", get(quiz_ws_handler))
        .route("/ws/presentation", get(presentation_ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let mut api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes);

    // Stored files are public; serve them when the URL prefix is local.
    if config.public_files_url.starts_with('/') && config.public_files_url.len() > 1 {
        info!(
            "Serving {} at {}",
            config.storage_root.display(),
            config.public_files_url
        );
        api_router = api_router.nest_service(
            &config.public_files_url,
            ServeDir::new(&config.storage_root),
        );
    }

    let api_router = api_router
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
