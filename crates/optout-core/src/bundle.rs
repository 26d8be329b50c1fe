//! Offline-verifiable proof bundles.
//!
//! The export is a zip with two entries: `manifest.json`, carrying every
//! proof record for the subject plus the algorithm identifiers and a
//! description of the Merkle construction, and `report.html` for human
//! readers. A third party can recompute roots and check signatures from
//! the manifest alone, with no access to the live system. A subject with
//! no proofs still gets a valid (empty) bundle.

use std::io::Write;

use chrono::{DateTime, Utc};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::{OptoutError, Result};
use crate::ledger::{ProofRecord, MERKLE_ALGORITHM};
use crate::signer::SIGNING_ALGORITHM;
use crate::store::Store;

const BUNDLE_FORMAT: &str = "optout-proof-bundle/1";

pub fn export_bundle(store: &Store, subject_id: &str, now: DateTime<Utc>) -> Result<Vec<u8>> {
    let records = store.proofs_for_subject(subject_id)?;
    let manifest = manifest_json(subject_id, &records, now)?;
    let report = report_html(subject_id, &records, now);

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut cursor);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        zip.start_file("manifest.json", options)
            .map_err(|e| OptoutError::Bundle(e.to_string()))?;
        zip.write_all(manifest.as_bytes())?;
        zip.start_file("report.html", options)
            .map_err(|e| OptoutError::Bundle(e.to_string()))?;
        zip.write_all(report.as_bytes())?;
        zip.finish().map_err(|e| OptoutError::Bundle(e.to_string()))?;
    }
    tracing::info!(subject_id, proofs = records.len(), "proof bundle exported");
    Ok(cursor.into_inner())
}

fn manifest_json(subject_id: &str, records: &[ProofRecord], now: DateTime<Utc>) -> Result<String> {
    let manifest = serde_json::json!({
        "format": BUNDLE_FORMAT,
        "subject_id": subject_id,
        "generated_at": now.to_rfc3339(),
        "merkle_algorithm": MERKLE_ALGORITHM,
        "signature_algorithm": SIGNING_ALGORITHM,
        "verification": {
            "leaves": "lowercase hex sha-256 hashes, deduplicated, sorted lexicographically",
            "pair": "sha256(min(a,b) || max(a,b)) over the decoded bytes",
            "odd_node": "paired with itself",
            "signature": "hmac-sha256 over the ascii root hex, hex encoded",
        },
        "proofs": records,
    });
    Ok(serde_json::to_string_pretty(&manifest)?)
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn report_html(subject_id: &str, records: &[ProofRecord], now: DateTime<Utc>) -> String {
    let mut rows = String::new();
    for record in records {
        rows.push_str(&format!(
            "<tr><td><code>{}</code></td><td>{}</td><td>{}</td><td><code>{}</code></td><td>{}</td><td>{}</td></tr>\n",
            record.id,
            record.created_at.to_rfc3339(),
            html_escape(record.controller_key.as_deref().unwrap_or("-")),
            record.root,
            if record.signature.is_some() { "signed" } else { "unsigned" },
            record.evidence_count,
        ));
    }
    if rows.is_empty() {
        rows.push_str("<tr><td colspan=\"6\">no proofs recorded for this subject</td></tr>\n");
    }
    format!(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Removal proof report</title>\n\
         <style>body{{font-family:sans-serif;margin:2rem}}table{{border-collapse:collapse}}\
         td,th{{border:1px solid #ccc;padding:0.4rem 0.6rem;text-align:left}}\
         code{{font-size:0.85em}}</style>\n</head>\n<body>\n\
         <h1>Removal proof report</h1>\n\
         <p>Subject <code>{}</code>, generated {}.</p>\n\
         <p>Each root is a Merkle commitment over the evidence hashes listed in\n\
         <code>manifest.json</code>; verify offline by recomputing the root and\n\
         checking the signature against it.</p>\n\
         <table>\n<tr><th>proof</th><th>created</th><th>controller</th>\
         <th>root</th><th>signature</th><th>evidence</th></tr>\n{}\
         </table>\n</body>\n</html>\n",
        html_escape(subject_id),
        now.to_rfc3339(),
        rows,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
