//! SQLite Read-Model DAOs
//!
//! Concrete data-access providers. Every call opens a fresh data context on
//! the blocking pool, mirroring a per-operation database context.

use crate::adapters::outbound::db_context::{
    ConferenceRegistration, DbContext, DbContextFactory, LogicalDatabase, Payments,
};
use crate::domain::entities::{
    ConferenceAlias, ConferenceDetails, PricedOrder, PricedOrderLine, SeatType,
    ThirdPartyProcessorPayment,
};
use crate::domain::ports::{ConferenceDao, DataAccessError, Disposable, OrderDao, PaymentDao};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

/// Run a query against a fresh context on the blocking pool.
async fn with_context<D, T, F>(factory: &DbContextFactory<D>, f: F) -> Result<T, DataAccessError>
where
    D: LogicalDatabase,
    T: Send + 'static,
    F: FnOnce(&DbContext) -> Result<T, DataAccessError> + Send + 'static,
{
    let factory = factory.clone();
    tokio::task::spawn_blocking(move || {
        let ctx = factory.open()?;
        f(&ctx)
    })
    .await
    .map_err(|e| DataAccessError::Task(e.to_string()))?
}

fn parse_uuid(raw: &str) -> Result<Uuid, DataAccessError> {
    Uuid::parse_str(raw).map_err(|e| DataAccessError::InvalidData(format!("{}: {}", raw, e)))
}

/// Conference read model over the registration database.
pub struct SqliteConferenceDao {
    contexts: DbContextFactory<ConferenceRegistration>,
}

impl SqliteConferenceDao {
    pub fn new(contexts: DbContextFactory<ConferenceRegistration>) -> Self {
        Self { contexts }
    }
}

impl Disposable for SqliteConferenceDao {}

#[async_trait]
impl ConferenceDao for SqliteConferenceDao {
    async fn get_conference_details(
        &self,
        conference_code: &str,
    ) -> Result<Option<ConferenceDetails>, DataAccessError> {
        let code = conference_code.to_string();
        with_context(&self.contexts, move |ctx| {
            let row = ctx
                .connection()
                .query_row(
                    "SELECT id, code, name, description, location, tagline, twitter_search, start_date
                     FROM conferences WHERE code = ?1",
                    params![code],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            ConferenceDetails {
                                id: Uuid::nil(),
                                code: row.get(1)?,
                                name: row.get(2)?,
                                description: row.get(3)?,
                                location: row.get(4)?,
                                tagline: row.get(5)?,
                                twitter_search: row.get(6)?,
                                start_date: row.get(7)?,
                            },
                        ))
                    },
                )
                .optional()?;

            row.map(|(id, mut details)| -> Result<_, DataAccessError> {
                details.id = parse_uuid(&id)?;
                Ok(details)
            })
            .transpose()
        })
        .await
    }

    async fn get_conference_alias(
        &self,
        conference_code: &str,
    ) -> Result<Option<ConferenceAlias>, DataAccessError> {
        let code = conference_code.to_string();
        with_context(&self.contexts, move |ctx| {
            let row = ctx
                .connection()
                .query_row(
                    "SELECT id, code, name, tagline FROM conferences WHERE code = ?1",
                    params![code],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;

            row.map(|(id, code, name, tagline)| -> Result<_, DataAccessError> {
                Ok(ConferenceAlias {
                    id: parse_uuid(&id)?,
                    code,
                    name,
                    tagline,
                })
            })
            .transpose()
        })
        .await
    }

    async fn get_published_seat_types(
        &self,
        conference_id: Uuid,
    ) -> Result<Vec<SeatType>, DataAccessError> {
        with_context(&self.contexts, move |ctx| {
            let mut stmt = ctx.connection().prepare(
                "SELECT id, name, description, price, available_quantity
                 FROM seat_types WHERE conference_id = ?1 ORDER BY name",
            )?;
            let rows = stmt
                .query_map(params![conference_id.to_string()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, name, description, price, available_quantity)| -> Result<_, DataAccessError> {
                    Ok(SeatType {
                        id: parse_uuid(&id)?,
                        conference_id,
                        name,
                        description,
                        price,
                        available_quantity,
                    })
                })
                .collect()
        })
        .await
    }
}

/// Order read model over the registration database.
pub struct SqliteOrderDao {
    contexts: DbContextFactory<ConferenceRegistration>,
}

impl SqliteOrderDao {
    pub fn new(contexts: DbContextFactory<ConferenceRegistration>) -> Self {
        Self { contexts }
    }
}

impl Disposable for SqliteOrderDao {}

#[async_trait]
impl OrderDao for SqliteOrderDao {
    async fn find_priced_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<PricedOrder>, DataAccessError> {
        with_context(&self.contexts, move |ctx| {
            let conn = ctx.connection();
            let id = order_id.to_string();

            let header = conn
                .query_row(
                    "SELECT order_version, total, reservation_expiration, is_free_of_charge
                     FROM priced_orders WHERE order_id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, f64>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, i64>(3)? != 0,
                        ))
                    },
                )
                .optional()?;

            let Some((order_version, total, reservation_expiration, is_free_of_charge)) = header
            else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT position, description, unit_price, quantity, line_total
                 FROM priced_order_lines WHERE order_id = ?1 ORDER BY position",
            )?;
            let lines = stmt
                .query_map(params![id], |row| {
                    Ok(PricedOrderLine {
                        position: row.get(0)?,
                        description: row.get(1)?,
                        unit_price: row.get(2)?,
                        quantity: row.get(3)?,
                        line_total: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Some(PricedOrder {
                order_id,
                order_version,
                total,
                lines,
                reservation_expiration,
                is_free_of_charge,
            }))
        })
        .await
    }

    async fn locate_order(
        &self,
        email: &str,
        access_code: &str,
    ) -> Result<Option<Uuid>, DataAccessError> {
        let email = email.to_string();
        let access_code = access_code.to_string();
        with_context(&self.contexts, move |ctx| {
            let id = ctx
                .connection()
                .query_row(
                    "SELECT order_id FROM order_access
                     WHERE registrant_email = ?1 COLLATE NOCASE AND access_code = ?2",
                    params![email, access_code],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            id.map(|id| parse_uuid(&id)).transpose()
        })
        .await
    }
}

/// Payment read model over the payments database.
pub struct SqlitePaymentDao {
    contexts: DbContextFactory<Payments>,
}

impl SqlitePaymentDao {
    pub fn new(contexts: DbContextFactory<Payments>) -> Self {
        Self { contexts }
    }
}

impl Disposable for SqlitePaymentDao {}

#[async_trait]
impl PaymentDao for SqlitePaymentDao {
    async fn find_third_party_processor_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<Option<ThirdPartyProcessorPayment>, DataAccessError> {
        with_context(&self.contexts, move |ctx| {
            let row = ctx
                .connection()
                .query_row(
                    "SELECT state, payment_source_id, description, total_amount
                     FROM third_party_processor_payments WHERE id = ?1",
                    params![payment_id.to_string()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, f64>(3)?,
                        ))
                    },
                )
                .optional()?;

            row.map(|(state, source, description, total_amount)| -> Result<_, DataAccessError> {
                Ok(ThirdPartyProcessorPayment {
                    id: payment_id,
                    state,
                    payment_source_id: parse_uuid(&source)?,
                    description,
                    total_amount,
                })
            })
            .transpose()
        })
        .await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::{SettingsEnvironment, SqliteStorageBootstrap};
    use crate::domain::ports::{SettingsSource, StorageBootstrap};
    use rusqlite::Connection;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        settings: Arc<dyn SettingsSource>,
        registration_path: String,
        payments_path: String,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let registration_path = dir.path().join("registration.db").to_string_lossy().to_string();
        let payments_path = dir.path().join("payments.db").to_string_lossy().to_string();
        let settings: Arc<dyn SettingsSource> = Arc::new(SettingsEnvironment::with_settings([
            (
                "ConnectionStrings:ConferenceRegistration".to_string(),
                registration_path.clone(),
            ),
            ("ConnectionStrings:Payments".to_string(), payments_path.clone()),
        ]));
        let bootstrap =
            SqliteStorageBootstrap::new(settings.clone(), "ConferenceRegistration", "Payments");
        bootstrap.initialize_schema().unwrap();
        bootstrap.apply_pending_migrations().unwrap();

        Fixture {
            _dir: dir,
            settings,
            registration_path,
            payments_path,
        }
    }

    #[tokio::test]
    async fn test_conference_details_and_alias() {
        let fx = fixture();
        let id = Uuid::new_v4();
        Connection::open(&fx.registration_path)
            .unwrap()
            .execute(
                "INSERT INTO conferences (id, code, name, description, location, tagline, twitter_search, start_date)
                 VALUES (?1, 'cqrs', 'CQRS Summit', 'desc', 'Redmond', 'tag', '#cqrs', '2026-11-01')",
                params![id.to_string()],
            )
            .unwrap();

        let dao = SqliteConferenceDao::new(DbContextFactory::new(
            "ConferenceRegistration",
            fx.settings.clone(),
        ));

        let details = dao.get_conference_details("cqrs").await.unwrap().unwrap();
        assert_eq!(details.id, id);
        assert_eq!(details.location, "Redmond");

        let alias = dao.get_conference_alias("cqrs").await.unwrap().unwrap();
        assert_eq!(alias.name, "CQRS Summit");

        assert!(dao.get_conference_details("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_published_seat_types() {
        let fx = fixture();
        let conference_id = Uuid::new_v4();
        let conn = Connection::open(&fx.registration_path).unwrap();
        for (name, price) in [("General", 199.0), ("Workshop", 99.0)] {
            conn.execute(
                "INSERT INTO seat_types (id, conference_id, name, price, available_quantity)
                 VALUES (?1, ?2, ?3, ?4, 10)",
                params![Uuid::new_v4().to_string(), conference_id.to_string(), name, price],
            )
            .unwrap();
        }

        let dao = SqliteConferenceDao::new(DbContextFactory::new(
            "ConferenceRegistration",
            fx.settings.clone(),
        ));
        let seats = dao.get_published_seat_types(conference_id).await.unwrap();

        assert_eq!(seats.len(), 2);
        assert_eq!(seats[0].name, "General");
        assert!(dao.get_published_seat_types(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_priced_order_with_lines() {
        let fx = fixture();
        let order_id = Uuid::new_v4();
        let conn = Connection::open(&fx.registration_path).unwrap();
        conn.execute(
            "INSERT INTO priced_orders (order_id, order_version, total, is_free_of_charge) VALUES (?1, 2, 300.0, 0)",
            params![order_id.to_string()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO priced_order_lines VALUES (?1, 0, 'General', 150.0, 2, 300.0)",
            params![order_id.to_string()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO order_access VALUES (?1, 'someone@example.com', 'ABC123')",
            params![order_id.to_string()],
        )
        .unwrap();

        let dao = SqliteOrderDao::new(DbContextFactory::new(
            "ConferenceRegistration",
            fx.settings.clone(),
        ));

        let order = dao.find_priced_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.order_version, 2);
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].quantity, 2);
        assert!(!order.is_free_of_charge);

        let located = dao.locate_order("SOMEONE@example.com", "ABC123").await.unwrap();
        assert_eq!(located, Some(order_id));
        assert!(dao.locate_order("someone@example.com", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_payment_lookup() {
        let fx = fixture();
        let payment_id = Uuid::new_v4();
        let source_id = Uuid::new_v4();
        Connection::open(&fx.payments_path)
            .unwrap()
            .execute(
                "INSERT INTO third_party_processor_payments VALUES (?1, 'Initiated', ?2, 'seats', 300.0)",
                params![payment_id.to_string(), source_id.to_string()],
            )
            .unwrap();

        let dao = SqlitePaymentDao::new(DbContextFactory::new("Payments", fx.settings.clone()));
        let payment = dao
            .find_third_party_processor_payment(payment_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(payment.payment_source_id, source_id);
        assert_eq!(payment.state, "Initiated");
    }

    #[tokio::test]
    async fn test_invalid_stored_id() {
        let fx = fixture();
        Connection::open(&fx.registration_path)
            .unwrap()
            .execute(
                "INSERT INTO conferences (id, code, name) VALUES ('not-a-uuid', 'bad', 'Bad')",
                [],
            )
            .unwrap();

        let dao = SqliteConferenceDao::new(DbContextFactory::new(
            "ConferenceRegistration",
            fx.settings.clone(),
        ));
        let result = dao.get_conference_alias("bad").await;
        assert!(matches!(result, Err(DataAccessError::InvalidData(_))));
    }
}
