/// Compose the external checkout link for an upload
///
/// With an email the link goes through `create-checkout`, which pre-fills
/// the payer; without one it falls back to the bare `pagar` page. Query
/// values are percent-encoded. Whether the link leads anywhere useful is
/// up to the payments host.
///
/// # Examples
/// ```
/// use aoc_portal::payment::checkout_url;
///
/// assert_eq!(
///     checkout_url("https://pay.example", "abc", Some("a@b.io")),
///     "https://pay.example/api/create-checkout?upload_id=abc&email=a%40b.io"
/// );
/// assert_eq!(
///     checkout_url("https://pay.example/", "abc", None),
///     "https://pay.example/pagar?upload_id=abc"
/// );
/// ```
pub fn checkout_url(host: &str, upload_id: &str, email: Option<&str>) -> String {
    let host = host.trim_end_matches('/');
    let upload_id = urlencoding::encode(upload_id);

    match email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) => format!(
            "{}/api/create-checkout?upload_id={}&email={}",
            host,
            upload_id,
            urlencoding::encode(email)
        ),
        None => format!("{}/pagar?upload_id={}", host, upload_id),
    }
}
