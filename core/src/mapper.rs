//! Catalog item → purchase request mapping.

use crate::error::ParseError;
use crate::model::{CatalogRecord, ItemRecord, PurchaseRequest};
use crate::notes::{NoteChannel, NoteKind};

/// Builds purchase requests from raw catalog items.
#[derive(Debug, Clone)]
pub struct RecordMapper {
    notes: NoteChannel,
}

impl RecordMapper {
    /// Create a mapper reading note values through `notes`.
    #[must_use]
    pub const fn new(notes: NoteChannel) -> Self {
        Self { notes }
    }

    /// The note channel used for correlation and patron values.
    #[must_use]
    pub const fn notes(&self) -> &NoteChannel {
        &self.notes
    }

    /// Parse a catalog item into a purchase request.
    ///
    /// The item payload is retained on the request untouched, since any later
    /// write-back must resend the entire record.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MissingField`] when the item has no `id`, `title`
    /// or `barcode`. A missing contributor is tolerated.
    pub fn parse(&self, item: &ItemRecord) -> Result<PurchaseRequest, ParseError> {
        let id = item.id().ok_or(ParseError::MissingField("id"))?;
        let title = item.title().ok_or(ParseError::MissingField("title"))?;
        let barcode = item.barcode().ok_or(ParseError::MissingField("barcode"))?;

        let mut request = PurchaseRequest {
            key: self.note(item, NoteKind::Correlation),
            title: Some(title.to_string()),
            contributor: item.first_contributor().map(str::to_string),
            requester_username: self.note(item, NoteKind::PatronRequesting),
            call_number: item.call_number().map(str::to_string),
            existing_folio_item_id: Some(id.to_string()),
            existing_folio_item: Some(item.clone()),
            ..PurchaseRequest::default()
        };
        request.append_comment(&format!("Lost Item. Barcode: {barcode}"));

        Ok(request)
    }

    fn note(&self, item: &ItemRecord, kind: NoteKind) -> Option<String> {
        self.notes.read(item, kind).map(str::to_string)
    }
}
