pub mod broker;
pub mod callback_service;
pub mod credential_service;
pub mod intake_service;
pub mod intent_service;
pub mod transaction_service;
pub mod worker;