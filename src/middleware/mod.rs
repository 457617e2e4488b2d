mod client_ctx;

pub use client_ctx::{ClientCtx, ClientCtxMiddleware, TOKEN_KEY};
