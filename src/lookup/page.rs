//! Renders lookup results as an HTML page.

use html_escape::{encode_double_quoted_attribute, encode_text};
use tokio::io::AsyncWrite;

use crate::http::response::StatusCode;
use crate::http::writer::{ResponseWriter, WriterError};
use crate::lookup::record::LookupRecord;
use crate::lookup::upstream::{LookupSession, Upstream};

const PAGE_HEAD: &str = r#"<html><head><style>
            table {padding: 5px; border-collapse: collapse;}
            th {text-align: left; padding-right: 20px;}
            .name {padding-right: 15px;}
            tr.even {background-color: #F5F5F5; }
            tr.odd {background-color: #DDDDDD; }
            </style></head><body><h1>mdb-lookup</h1>
            <form method=GET action="/mdb-lookup">"#;

const TABLE_HEAD: &str = "<hr>\n<table><tr><th>Num</th><th>Name</th><th>Message</th></tr>\n";
const TABLE_ERROR: &str = "<tr><td colspan=3>lookup failed</td></tr>\n";
const TABLE_FOOT: &str = "</table>\n";
const PAGE_FOOT: &str = "</body></html>";

/// The search form, pre-filled with the current query.
pub fn render_form(query: &str) -> String {
    format!(
        "Lookup: <input type=text name=key value=\"{}\">\n<input type=submit></form>",
        encode_double_quoted_attribute(query)
    )
}

/// One table row. Rows alternate `even`/`odd`, starting with `even`.
pub fn render_row(index: usize, record: &LookupRecord) -> String {
    let class = if index % 2 == 0 { "even" } else { "odd" };
    format!(
        "<tr class={}><td class=num>{}</td><td class=name>{}</td><td class=msg>{}</td></tr>\n",
        class,
        record.number,
        encode_text(&record.name),
        encode_text(&record.message)
    )
}

/// Answers a lookup request.
///
/// Without a query only the form is rendered. With one, the query is sent
/// upstream and the status is committed once the first reply line is in:
/// a failure before that point becomes an error page, a failure after rows
/// have gone out ends the table with an error row.
pub async fn serve_lookup<W>(
    writer: &mut ResponseWriter<W>,
    upstream: &Upstream,
    query: Option<&str>,
) -> Result<(), WriterError>
where
    W: AsyncWrite + Unpin,
{
    let Some(query) = query else {
        writer.send_headers(StatusCode::Ok).await?;
        writer.send_body(PAGE_HEAD.as_bytes()).await?;
        writer.send_body(render_form("").as_bytes()).await?;
        return writer.send_body(PAGE_FOOT.as_bytes()).await;
    };

    let mut session = match upstream.begin(query).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, query = %query, "Lookup could not be started");
            return writer.send_error_page(e.status(), None).await;
        }
    };

    let first = match session.next_record().await {
        Ok(first) => first,
        Err(e) => {
            drop(session);
            return writer.send_error_page(e.status(), None).await;
        }
    };

    let streamed = stream_results(writer, &mut session, query, first).await;
    if streamed.is_err() {
        // Client is gone; the reply still has to be consumed.
        session.drain().await;
    }
    streamed
}

async fn stream_results<W>(
    writer: &mut ResponseWriter<W>,
    session: &mut LookupSession<'_>,
    query: &str,
    first: Option<LookupRecord>,
) -> Result<(), WriterError>
where
    W: AsyncWrite + Unpin,
{
    writer.send_headers(StatusCode::Ok).await?;
    writer.send_body(PAGE_HEAD.as_bytes()).await?;
    writer.send_body(render_form(query).as_bytes()).await?;
    writer.send_body(TABLE_HEAD.as_bytes()).await?;

    let mut next = first;
    let mut index = 0;
    while let Some(record) = next {
        writer.send_body(render_row(index, &record).as_bytes()).await?;
        writer.flush().await?;
        index += 1;

        next = match session.next_record().await {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(error = %e, rows = index, "Lookup reply ended abnormally");
                writer.send_body(TABLE_ERROR.as_bytes()).await?;
                None
            }
        };
    }

    writer.send_body(TABLE_FOOT.as_bytes()).await?;
    writer.send_body(PAGE_FOOT.as_bytes()).await
}
