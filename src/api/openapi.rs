//! OpenAPI document for every REST endpoint.

use utoipa::OpenApi;

use crate::api::dto::{
    AddParticipantRequest, AddStandRequest, BuyTicketRequest, CheckoutSession,
    CreateInteractionRequest, CreateStandRequest, CreateTombolaRequest, DistributeRequest,
    GradeRequest, InviteRequest, KermesseRequest, PaymentEvent, PaymentEventData,
    RegisterRequest, UpdateStandRequest, UpdateTombolaRequest,
};
use crate::api::handlers::{
    interaction, kermesse, stand, system, ticket, tombola, user, webhook,
};
use crate::domain::{
    Interaction, InteractionKind, Kermesse, Role, Stand, StandKind, Status, Ticket, Tombola,
    TombolaDraw, User,
};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI specification, served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "Kermesse API",
        description = "School fair backend: token wallets, stands, interactions and tombolas."
    ),
    paths(
        system::health_handler,
        user::register,
        user::me,
        user::get_user,
        user::list_children,
        user::invite_child,
        user::distribute,
        webhook::payment_webhook,
        stand::create_stand,
        stand::list_stands,
        stand::current_stand,
        stand::update_current_stand,
        stand::get_stand,
        stand::update_stand,
        kermesse::create_kermesse,
        kermesse::list_kermesses,
        kermesse::get_kermesse,
        kermesse::update_kermesse,
        kermesse::invitable_children,
        kermesse::add_participant,
        kermesse::add_stand,
        kermesse::end_kermesse,
        interaction::create_interaction,
        interaction::list_interactions,
        interaction::get_interaction,
        interaction::grade_interaction,
        tombola::create_tombola,
        tombola::list_tombolas,
        tombola::get_tombola,
        tombola::update_tombola,
        tombola::end_tombola,
        ticket::buy_ticket,
        ticket::list_tickets,
        ticket::get_ticket,
    ),
    components(schemas(
        ErrorResponse,
        ErrorBody,
        Role,
        Status,
        StandKind,
        InteractionKind,
        User,
        Stand,
        Kermesse,
        Interaction,
        Tombola,
        TombolaDraw,
        Ticket,
        RegisterRequest,
        InviteRequest,
        DistributeRequest,
        CreateStandRequest,
        UpdateStandRequest,
        KermesseRequest,
        AddParticipantRequest,
        AddStandRequest,
        CreateInteractionRequest,
        GradeRequest,
        CreateTombolaRequest,
        UpdateTombolaRequest,
        BuyTicketRequest,
        PaymentEvent,
        PaymentEventData,
        CheckoutSession,
        system::HealthResponse,
        webhook::WebhookAck,
    )),
    tags(
        (name = "System", description = "Service health"),
        (name = "Users", description = "Accounts and token wallets"),
        (name = "Payments", description = "Token top-ups from the payment provider"),
        (name = "Stands", description = "Sale and activity stands"),
        (name = "Kermesses", description = "Fair lifecycle and membership"),
        (name = "Interactions", description = "Purchases and activity participation"),
        (name = "Tombolas", description = "Raffles and draws"),
        (name = "Tickets", description = "Raffle tickets"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/register",
            "/me",
            "/webhook",
            "/api/v1/stands/{id}",
            "/api/v1/kermesses/{id}/end",
            "/api/v1/interactions",
            "/api/v1/tombolas/{id}/end",
            "/api/v1/tickets",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
