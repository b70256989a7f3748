// Car-rental core: pricing, discounts, reservations, rentals and the
// orchestration of the services they touch

pub mod auth;
pub mod clients;
pub mod config;
pub mod db;
pub mod discounts;
pub mod error;
pub mod orchestrator;
pub mod pricing;
pub mod rentals;
pub mod reservations;

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use auth::TokenService;
use clients::{ReservationGateway, VehicleDirectory};
use config::AppConfig;
use discounts::{DiscountRuleService, DiscountRuleStore, PgDiscountRuleStore};
use orchestrator::{CallPolicy, Orchestrator, PgSagaLog, SagaLog};
use rentals::{PgRentalStore, RentalService, RentalSettings, RentalStore};
use reservations::{PgReservationStore, ReservationService, ReservationStore};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        pricing::handlers::quote_handler,
        reservations::handlers::create_reservation_handler,
        reservations::handlers::list_reservations_handler,
        reservations::handlers::get_reservation_handler,
        reservations::handlers::confirm_payment_handler,
        reservations::handlers::cancel_reservation_handler,
    ),
    components(
        schemas(
            pricing::QuoteRequest,
            pricing::PricingBreakdown,
            pricing::SelectedOption,
            reservations::ReservationStatus,
            reservations::CreateReservationRequest,
            reservations::ConfirmPaymentRequest,
            reservations::ReservationResponse,
            reservations::CancellationResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "pricing", description = "Price quotes with loyalty discounts"),
        (name = "reservations", description = "Reservation lifecycle endpoints")
    ),
    info(
        title = "Rental Core API",
        version = "0.1.0",
        description = "Pricing, reservations and rentals of the car-rental platform"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Storage backends of the services
#[derive(Clone)]
pub struct Stores {
    pub reservations: Arc<dyn ReservationStore>,
    pub discount_rules: Arc<dyn DiscountRuleStore>,
    pub rentals: Arc<dyn RentalStore>,
    pub sagas: Arc<dyn SagaLog>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            reservations: Arc::new(PgReservationStore::new(pool.clone())),
            discount_rules: Arc::new(PgDiscountRuleStore::new(pool.clone())),
            rentals: Arc::new(PgRentalStore::new(pool.clone())),
            sagas: Arc::new(PgSagaLog::new(pool)),
        }
    }
}

/// Business settings shared by the services
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub tax_rate: Decimal,
    pub call_policy: CallPolicy,
    pub rentals: RentalSettings,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(18, 2),
            call_policy: CallPolicy::default(),
            rentals: RentalSettings::default(),
        }
    }
}

impl From<&AppConfig> for ServiceSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            tax_rate: config.tax_rate,
            call_policy: config.call_policy.clone(),
            rentals: RentalSettings {
                charge_rates: config.charge_rates.clone(),
                contract_signature_required: config.contract_signature_required,
            },
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub reservation_service: Arc<ReservationService>,
    pub discount_service: Arc<DiscountRuleService>,
    pub rental_service: Arc<RentalService>,
    pub orchestrator: Arc<Orchestrator>,
    pub token_service: Arc<TokenService>,
}

impl AppState {
    /// Wire services over the given stores and vehicle collaborator
    pub fn new(
        stores: Stores,
        vehicles: Arc<dyn VehicleDirectory>,
        token_service: Arc<TokenService>,
        settings: ServiceSettings,
    ) -> Self {
        let reservation_service = Arc::new(ReservationService::new(
            stores.reservations,
            stores.discount_rules.clone(),
            vehicles.clone(),
            settings.tax_rate,
        ));
        let reservations: Arc<dyn ReservationGateway> = reservation_service.clone();

        let orchestrator = Arc::new(Orchestrator::new(
            vehicles.clone(),
            reservations.clone(),
            stores.sagas,
            settings.call_policy,
        ));

        let rental_service = Arc::new(RentalService::new(
            stores.rentals,
            reservations,
            vehicles,
            orchestrator.clone(),
            settings.rentals,
        ));

        Self {
            reservation_service,
            discount_service: Arc::new(DiscountRuleService::new(stores.discount_rules)),
            rental_service,
            orchestrator,
            token_service,
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS and tracing middleware
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        // Pricing
        .route("/api/pricing/quote", post(pricing::quote_handler))
        // Reservations
        .route(
            "/api/reservations",
            post(reservations::create_reservation_handler).get(reservations::list_reservations_handler),
        )
        .route(
            "/api/reservations/confirmation/:number",
            get(reservations::get_reservation_by_confirmation_handler),
        )
        .route("/api/reservations/:id", get(reservations::get_reservation_handler))
        .route("/api/reservations/:id/payment", post(reservations::confirm_payment_handler))
        .route("/api/reservations/:id/cancel", post(reservations::cancel_reservation_handler))
        // Discount rules
        .route(
            "/api/discount-rules",
            get(discounts::list_discount_rules_handler).post(discounts::create_discount_rule_handler),
        )
        .route("/api/discount-rules/:id", put(discounts::update_discount_rule_handler))
        // Rentals
        .route(
            "/api/rentals",
            post(rentals::create_rental_handler).get(rentals::list_rentals_handler),
        )
        .route("/api/rentals/overdue", get(rentals::list_overdue_rentals_handler))
        .route("/api/rentals/:id", get(rentals::get_rental_handler))
        .route("/api/rentals/:id/check-out", post(rentals::check_out_handler))
        .route("/api/rentals/:id/check-in", post(rentals::check_in_handler))
        .route("/api/rentals/:id/complete", post(rentals::complete_rental_handler))
        .route("/api/rentals/:id/cancel", post(rentals::cancel_rental_handler))
        .route("/api/rentals/:id/inspections", get(rentals::list_inspections_handler))
        .route(
            "/api/rentals/:id/inspections/comparison",
            get(rentals::compare_inspections_handler),
        )
        .route("/api/rentals/:id/contract", get(rentals::get_contract_handler))
        .route("/api/rentals/:id/contract/sign", post(rentals::sign_contract_handler))
        // Orchestration
        .route("/api/orchestrations/pending", get(orchestrator::list_pending_sagas_handler))
        .route("/api/orchestrations/reconcile", post(orchestrator::reconcile_sagas_handler))
        .route("/api/orchestrations/:id/resume", post(orchestrator::resume_saga_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod pg_tests;

#[cfg(test)]
mod testing;
