//! Read-Model Ports
//!
//! Data-access capabilities exposed to request dispatch. Concrete providers
//! are chosen by the composition root; callers only see these traits.

use crate::domain::entities::{
    ConferenceAlias, ConferenceDetails, PricedOrder, SeatType, ThirdPartyProcessorPayment,
};
use crate::domain::ports::{Disposable, SettingsError};
use async_trait::async_trait;
use uuid::Uuid;

/// Read access to published conference information.
///
/// This is the capability that benefits from caching: it is read on every
/// page of the public site and changes rarely.
#[async_trait]
pub trait ConferenceDao: Disposable {
    /// Get the full details of a published conference by its code.
    async fn get_conference_details(
        &self,
        conference_code: &str,
    ) -> Result<Option<ConferenceDetails>, DataAccessError>;

    /// Get the short reference of a conference by its code.
    async fn get_conference_alias(
        &self,
        conference_code: &str,
    ) -> Result<Option<ConferenceAlias>, DataAccessError>;

    /// Get the seat types offered by a conference.
    async fn get_published_seat_types(
        &self,
        conference_id: Uuid,
    ) -> Result<Vec<SeatType>, DataAccessError>;
}

/// Read access to orders.
#[async_trait]
pub trait OrderDao: Disposable {
    /// Get an order with its computed totals.
    async fn find_priced_order(&self, order_id: Uuid)
        -> Result<Option<PricedOrder>, DataAccessError>;

    /// Find an order id from the registrant email and access code.
    async fn locate_order(
        &self,
        email: &str,
        access_code: &str,
    ) -> Result<Option<Uuid>, DataAccessError>;
}

/// Read access to payments.
#[async_trait]
pub trait PaymentDao: Disposable {
    async fn find_third_party_processor_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<Option<ThirdPartyProcessorPayment>, DataAccessError>;
}

/// Errors raised by data-access providers.
#[derive(Debug, thiserror::Error)]
pub enum DataAccessError {
    #[error("cannot open data context {context}: {source}")]
    Context {
        context: String,
        #[source]
        source: SettingsError,
    },
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("stored value is invalid: {0}")]
    InvalidData(String),
    #[error("data access task failed: {0}")]
    Task(String),
}
