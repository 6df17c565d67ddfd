pub mod confirmation_service;
pub mod email_service;
pub mod listing_service;
pub mod photo_store;
pub mod registration_service;

pub use confirmation_service::{ConfirmationService, ConfirmationServiceError};
pub use email_service::{create_email_service, EmailError, EmailService, MockEmailService};
pub use listing_service::{ListingService, ListingServiceError, WhitelistPage};
pub use photo_store::{PhotoStore, PhotoStoreError};
pub use registration_service::{
    RegisteredApplication, RegistrationService, RegistrationServiceError,
};
