pub mod budgets;
pub mod rails;
pub mod receipts;
pub mod router;

pub use budgets::{BudgetFinalizeDisposition, BudgetHooks, BudgetReservation, InMemoryBudgetHooks};
pub use rails::runtime::RuntimeInternalApiClient;
pub use receipts::{PAYMENT_ATTEMPT_RECEIPT_SCHEMA_V1, PaymentAttemptReceiptV1, PaymentRouteKind};
pub use router::{
    CepPaymentContext, NeobankError, QuoteAndPayBolt11Request, QuoteAndPayBolt11Response,
    RoutePolicy, TreasuryRouter,
};
