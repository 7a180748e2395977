//! HTML pages.
//!
//! Every caller-supplied string goes through [`escape`] before it is written
//! into markup. Ids and data URLs are generated server-side and contain no
//! markup characters, but are escaped as well.

use crate::store::CertificateRecord;

const STYLE: &str = r#"
body { font-family: Arial, sans-serif; background-color: #f4f4f4; margin: 0; padding: 0;
       display: flex; justify-content: center; align-items: center; min-height: 100vh; }
.container { background-color: #fff; padding: 20px; border-radius: 10px;
             box-shadow: 0 0 10px rgba(0, 0, 0, 0.1); max-width: 400px; width: 100%; text-align: center; }
h1 { margin-bottom: 20px; color: #333; }
form { display: flex; flex-direction: column; }
label { margin-bottom: 5px; font-weight: bold; text-align: left; }
input[type="text"] { padding: 10px; margin-bottom: 20px; border: 1px solid #ddd; border-radius: 5px; }
button { padding: 10px; background-color: #28a745; border: none; border-radius: 5px; color: #fff; font-size: 16px; cursor: pointer; }
button:hover { background-color: #218838; }
.certificate-info { margin-bottom: 20px; text-align: left; padding: 10px; border: 1px solid #ddd;
                    border-radius: 5px; background-color: #f9f9f9; }
img { margin-top: 20px; max-width: 100%; }
.footer { margin-top: 20px; font-size: 12px; color: #777; }
"#;

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
<div class="container">
{body}
</div>
</body>
</html>
"#,
        title = escape(title),
    )
}

/// The form that posts a name to `/generate`.
pub fn index() -> String {
    page(
        "Certificate Generator",
        r#"    <h1>Certificate Generator</h1>
    <form action="/generate" method="post">
        <label for="name">Name</label>
        <input type="text" id="name" name="name" maxlength="120" required>
        <button type="submit">Generate Certificate</button>
    </form>"#,
    )
}

/// Confirmation shown after a certificate is issued.
pub fn generated(download_url: &str, verification_url: &str, qr_data_url: &str) -> String {
    page(
        "Certificate Generator",
        &format!(
            r#"    <h1>Certificate Generated</h1>
    <p>Your certificate has been generated successfully.</p>
    <p><a href="{download}" download>Download Certificate</a></p>
    <div class="footer">
        <p>Verify your certificate <a href="{verify}">click here</a> or scan QR</p>
        <img src="{qr}" alt="QR Code">
    </div>"#,
            download = escape(download_url),
            verify = escape(verification_url),
            qr = escape(qr_data_url),
        ),
    )
}

/// Public view of an issued certificate.
pub fn verification(record: &CertificateRecord) -> String {
    page(
        "Certificate Verification",
        &format!(
            r#"    <h1>Certificate Verification</h1>
    <div class="certificate-info">
        <p><strong>Name:</strong> {name}</p>
        <p><strong>Certificate ID:</strong> {id}</p>
        <p><strong>Issued:</strong> {issued}</p>
    </div>
    <img src="{qr}" alt="QR Code">"#,
            name = escape(record.name.as_str()),
            id = escape(&record.id.to_string()),
            issued = record.issued_at.format("%Y-%m-%d"),
            qr = escape(&record.qr),
        ),
    )
}
