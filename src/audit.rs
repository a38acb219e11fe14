/// Logs a token issuance audit event.
///
/// Wraps `tracing::info!`, adding `audit=true`, `auditType="token_issuance"`
/// and the current request's endpoint, host and method.
///
/// # Examples
///
/// ```ignore
/// audit!(channel = %name, "issued publisher token");
/// ```
#[macro_export]
macro_rules! audit {
    ($($arg:tt)+) => {
        $crate::middleware::with_request_info(|ctx| {
            tracing::info!(
                audit = true,
                auditType = "token_issuance",
                endpoint = %ctx.endpoint,
                host = %ctx.host,
                httpMethod = %ctx.method,
                requestId = %ctx.request_id,
                $($arg)+
            )
        })
    };
}
