pub mod qr_code;
pub mod visit;

pub use qr_code::{
    CreateQrCodeRequest, QrCode, QrCodeChanges, UpdateQrCodeRequest, ValidCreateQrCode,
    DEFAULT_COLOR,
};
pub use visit::Visit;
