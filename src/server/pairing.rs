// Pairing payload for the mobile client: connection details plus a PNG QR code of them
use crate::config::AppConfig;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Luma};
use qrcode::QrCode;
use serde::Serialize;
use std::io::Cursor;
use thiserror::Error;

const QR_MIN_SIZE: u32 = 256;

#[derive(Debug, Error)]
pub enum PairingError {
    #[error("Failed to encode pairing QR code: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("Failed to render pairing QR image: {0}")]
    Render(#[from] image::ImageError),
}

#[derive(Debug, Serialize)]
struct PairingDetails<'a> {
    host: &'a str,
    port: u16,
    token: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PairingResponse {
    /// JSON text encoded in the QR code
    pub payload: String,
    /// Base64 PNG of the QR code
    pub qr_base64: String,
}

pub fn pairing_payload(config: &AppConfig) -> String {
    let details = PairingDetails {
        host: &config.bind_host,
        port: config.bind_port,
        token: &config.auth_token,
    };
    // Plain strings and integers always serialize
    serde_json::to_string(&details).unwrap_or_default()
}

pub fn render_qr_png(payload: &str) -> Result<Vec<u8>, PairingError> {
    let code = QrCode::new(payload.as_bytes())?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
        .build();
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

pub fn build_pairing(config: &AppConfig) -> Result<PairingResponse, PairingError> {
    let payload = pairing_payload(config);
    let png = render_qr_png(&payload)?;
    Ok(PairingResponse {
        qr_base64: STANDARD.encode(png),
        payload,
    })
}
