use crate::Id;
use events::{DocumentStatus, DomainEvent, EventPublisher};
use log::*;
use serde::{Deserialize, Serialize};

/// A driver's submitted verification document (licence, vehicle registration...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Id,
    pub owner_id: Id,
    pub status: DocumentStatus,
}

/// Tells the document's owner that a reviewer changed its status.
pub async fn notify_status_changed(publisher: &EventPublisher, document: &Document) {
    if document.owner_id == 0 {
        warn!("Document {} has no owner to notify", document.id);
        return;
    }

    debug!(
        "Document {} of user {} now {}",
        document.id, document.owner_id, document.status
    );
    publisher
        .publish(DomainEvent::DocumentStatusChanged {
            document_id: document.id,
            status: document.status,
            notify_user_ids: vec![document.owner_id],
        })
        .await;
}
