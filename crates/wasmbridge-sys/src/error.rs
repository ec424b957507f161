use crate::wb_byte_vec_t;

/// A non-trap failure reported by the engine.
pub struct wb_error_t {
    pub(crate) error: anyhow::Error,
}

impl From<anyhow::Error> for wb_error_t {
    fn from(error: anyhow::Error) -> Self {
        Self { error }
    }
}

pub extern "C" fn wb_error_message(error: &wb_error_t, message: &mut wb_byte_vec_t) {
    message.set_buffer(format!("{:#}", error.error).into_bytes());
}

pub extern "C" fn wb_error_delete(_error: Box<wb_error_t>) {}
