//! Typed ID definitions.

use crate::define_id;

define_id!(
    /// Identifies one issued certificate. Doubles as the PDF file stem.
    CertificateId,
    "cert"
);

define_id!(
    /// Correlates log lines and responses for a single HTTP request.
    RequestId,
    "req"
);
