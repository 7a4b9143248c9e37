//! Request-independent business rules. Handlers parse input and shape
//! responses; everything in between lives here.

pub mod auth;
pub mod categories;
pub mod events;
pub mod registrations;

pub use auth::{AuthOutcome, AuthService, SignupInput};
pub use categories::CategoryService;
pub use events::{EventInput, EventService};
pub use registrations::RegistrationService;
