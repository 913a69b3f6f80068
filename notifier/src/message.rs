use aws_lambda_events::event::s3::S3EventRecord;
use tera::{Context, Tera};

use crate::NotifyError;

pub const SUBJECT: &str = "File Uploaded to S3 bucket";

/// One uploaded object, as reported by an S3 event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadNotice {
    pub bucket: String,
    pub key: String,
}

impl UploadNotice {
    pub fn from_record(record: &S3EventRecord) -> Result<UploadNotice, NotifyError> {
        let bucket = record
            .s3
            .bucket
            .name
            .clone()
            .ok_or(NotifyError::MissingField("bucket name"))?;
        let key = record
            .s3
            .object
            .key
            .as_deref()
            .ok_or(NotifyError::MissingField("object key"))?;

        Ok(UploadNotice {
            bucket,
            key: decode_key(key),
        })
    }
}

// Keys arrive form-encoded: `+` for space, `%XX` for everything else.
fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(key) => key.into_owned(),
        Err(_) => spaced,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Renders upload notices with the embedded `upload.html` and `upload.txt`
/// templates. HTML output is autoescaped, plain text is not.
pub struct EmailRenderer {
    engine: Tera,
}

impl EmailRenderer {
    pub fn new() -> Result<EmailRenderer, NotifyError> {
        let mut engine = Tera::default();
        engine
            .add_raw_templates(vec![
                ("upload.html", include_str!("../templates/upload.html")),
                ("upload.txt", include_str!("../templates/upload.txt")),
            ])
            .map_err(|e| NotifyError::Template(e.to_string()))?;

        Ok(EmailRenderer { engine })
    }

    pub fn render(&self, notice: &UploadNotice) -> Result<EmailMessage, NotifyError> {
        let mut context = Context::new();
        context.insert("bucket", &notice.bucket);
        context.insert("key", &notice.key);

        let html_body = self
            .engine
            .render("upload.html", &context)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        let text_body = self
            .engine
            .render("upload.txt", &context)
            .map_err(|e| NotifyError::Template(e.to_string()))?;

        Ok(EmailMessage {
            subject: SUBJECT.to_owned(),
            html_body,
            text_body,
        })
    }
}
