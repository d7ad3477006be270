//! [`Listing`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select};
use postgres_types::Json;
use tokio_postgres::Row;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{listing, Listing},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl Database<Insert<listing::Document>> for Postgres {
    type Ok = Listing;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(document): Insert<listing::Document>,
    ) -> Result<Self::Ok, Self::Err> {
        // Both `id` and `created_at` are assigned by the database.
        const SQL: &str = "\
            INSERT INTO listings (document) \
            VALUES ($1::JSONB) \
            RETURNING id, created_at";
        let row = self
            .query_one(SQL, &[&Json(&document)])
            .await
            .map_err(tracerr::wrap!())?;

        let listing = Listing {
            id: row.get("id"),
            document,
            created_at: row.get("created_at"),
        };
        log::debug!("inserted `Listing(id: {})`", listing.id);

        Ok(listing)
    }
}

impl Database<Select<By<Option<Listing>, listing::Id>>> for Postgres {
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT id, document, created_at \
            FROM listings \
            WHERE id = $1::UUID";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| from_row(&row)))
    }
}

/// Reads a [`Listing`] from the provided [`Row`].
fn from_row(row: &Row) -> Listing {
    let Json(document) = row.get("document");
    Listing {
        id: row.get("id"),
        document,
        created_at: row.get("created_at"),
    }
}
