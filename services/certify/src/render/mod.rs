//! Certificate artifacts: the QR image and the PDF document.

mod pdf;
mod qr;

pub use pdf::{render_certificate, PdfError, DISCLAIMER, TITLE};
pub use qr::{QrError, QrImage, PNG_DATA_URL_PREFIX};

#[cfg(test)]
pub(crate) use qr::tests as qr_tests;
