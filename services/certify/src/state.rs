//! Application state shared across request handlers.

use std::sync::Arc;

use crate::service::CertificateService;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    service: CertificateService,
}

impl AppState {
    /// Create a new application state.
    pub fn new(service: CertificateService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { service }),
        }
    }

    /// Get a reference to the certificate service.
    pub fn service(&self) -> &CertificateService {
        &self.inner.service
    }
}
