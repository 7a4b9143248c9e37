pub mod category;
pub mod event;
pub mod otp;
pub mod registration;
pub mod user;

pub use category::{Category, CategoryChanges, NewCategory};
pub use event::{Event, EventChanges, NewEvent};
pub use otp::{NewOtpRecord, OtpPurpose, OtpRecord};
pub use registration::{NewRegistration, Registration, RegistrationStatus};
pub use user::{Credential, NewUser, Role, User, UserSummary};
