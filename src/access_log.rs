//! Write HTTP access log lines in the Combined Log Format (extended
//! Common Log Format), as per
//! <https://httpd.apache.org/docs/2.4/logs.html>, to stderr.

use std::io::{stderr, BufWriter, Write};
use std::panic;
use std::time::{Duration, Instant, SystemTime};

use anyhow::Result;
use chrono::{DateTime, Utc, Datelike, Timelike};

use crate::aresponse::AResponse;
use crate::request_context::RequestContext;
use crate::warn;

static MONTHS: &[&str; 12] = &[
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"
];

// "06/Dec/2023:02:02:47 +0000"
pub fn write_time(
    outp: &mut impl Write,
    time: SystemTime
) -> Result<()> {
    let dt: DateTime<Utc> = DateTime::from(time);
    write!(outp, "{:02}/{}/{:04}:{:02}:{:02}:{:02} +0000",
           dt.day(), MONTHS[dt.month0() as usize], dt.year(),
           dt.hour(), dt.minute(), dt.second())?;
    Ok(())
}

fn request_line(context: &RequestContext) -> String {
    format!("{} {} HTTP/1.1", context.method(), context.uri())
}

// 18.134.151.89 - - [06/Dec/2023:02:02:47 +0000] "GET /login.jsp HTTP/1.1" 404 447 "-" "agent" 1.2ms
pub fn write_combined(
    outp: &mut impl Write,
    context: &RequestContext,
    duration: Duration,
    aresponse: &AResponse,
) -> Result<()> {
    // The time when the entry is made, not when the request started
    let now = SystemTime::now();
    match context.client_ip() {
        Some(ip) => write!(outp, "{ip} - - [")?,
        None => write!(outp, "- - - [")?,
    }
    write_time(outp, now)?;
    writeln!(outp, "] {:?} {} {} {:?} {:?} {duration:?}",
             request_line(context),
             aresponse.status,
             aresponse.body.len(),
             context.header("Referer").unwrap_or("-"),
             context.header("User-Agent").unwrap_or("-"))?;
    outp.flush()?;
    Ok(())
}

/// Panic log to stderr.
fn write_panic(
    outp: &mut impl Write,
    context: &RequestContext,
    duration: Duration
) -> Result<()> {
    writeln!(outp, "[panic] handling {:?} after {duration:?}",
             request_line(context))?;
    outp.flush()?;
    Ok(())
}

/// Run `handler` and log the request. Panics are logged and
/// resumed.
pub fn log_combined<F>(context: &mut RequestContext, handler: F) -> AResponse
where F: FnOnce(&mut RequestContext) -> AResponse
{
    let start_instant = Instant::now();
    let result = panic::catch_unwind(panic::AssertUnwindSafe(|| handler(&mut *context)));
    let elapsed = start_instant.elapsed();
    let mut outp = BufWriter::new(stderr().lock());
    match result {
        Ok(response) => {
            if let Err(e) = write_combined(&mut outp, context, elapsed, &response) {
                warn!("could not write access log: {e:#}");
            }
            response
        }
        Err(payload) => {
            let _ = write_panic(&mut outp, context, elapsed);
            panic::resume_unwind(payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn t_write_time() -> Result<()> {
        let mut out = Vec::new();
        write_time(&mut out, UNIX_EPOCH + Duration::from_secs(1701828167))?;
        assert_eq!(String::from_utf8(out)?, "06/Dec/2023:02:02:47 +0000");
        Ok(())
    }

    #[test]
    fn t_write_combined() -> Result<()> {
        let ctx = RequestContext::new("GET", "/login.jsp?x=1")
            .with_client_ip("18.134.151.89".parse()?)
            .with_header("user-agent", "ALittle Client");
        let response = AResponse::html(404, "12345");
        let mut out = Vec::new();
        write_combined(&mut out, &ctx, Duration::from_millis(3), &response)?;
        let line = String::from_utf8(out)?;
        assert!(line.starts_with("18.134.151.89 - - ["));
        assert!(line.ends_with(
            "] \"GET /login.jsp?x=1 HTTP/1.1\" 404 5 \"-\" \"ALittle Client\" 3ms\n"));
        Ok(())
    }

    #[test]
    fn t_log_combined() {
        let mut ctx = RequestContext::new("get", "/");
        let r = log_combined(&mut ctx, |ctx| {
            ctx.set_mime("text/plain");
            AResponse::empty(204)
        });
        assert_eq!(r.status, 204);
        assert_eq!(ctx.mime(), Some("text/plain"));
        assert_eq!(request_line(&ctx), "GET / HTTP/1.1");
    }
}
