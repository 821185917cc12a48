// 📚 Knowledge Base - question/answer pairs used for matching
// Loaded once from medical_qna; read-only while requests are matched.
// Refreshed only by the CSV import step.

use crate::db::{
    clear_knowledge_entries, get_all_knowledge_entries, insert_knowledge_entry, KnowledgeEntry,
    StoreError,
};
use crate::normalizer::canonicalize;
use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::path::Path;

// ============================================================================
// KNOWLEDGE BASE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    pub fn from_entries(entries: Vec<KnowledgeEntry>) -> Self {
        KnowledgeBase { entries }
    }

    /// Snapshot of every stored entry, in insertion order
    pub fn load(conn: &Connection) -> Result<Self, StoreError> {
        let entries = get_all_knowledge_entries(conn)?;
        tracing::info!(entries = entries.len(), "knowledge base loaded");
        Ok(KnowledgeBase { entries })
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// CSV INGESTION
// ============================================================================

/// One usable CSV row, already trimmed
#[derive(Debug, Clone, PartialEq)]
pub struct QnaRecord {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportStats {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Read question/answer rows. Accepts `question,answer` or `input,output`
/// headers; rows with an empty side are skipped.
pub fn load_qna_csv(csv_path: &Path) -> Result<Vec<QnaRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file: {:?}", csv_path))?;

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };

    let (question_idx, answer_idx) = match (position("question"), position("answer")) {
        (Some(q), Some(a)) => (q, a),
        _ => match (position("input"), position("output")) {
            (Some(q), Some(a)) => (q, a),
            _ => bail!(
                "CSV must contain either 'input/output' or 'question/answer' columns, found {:?}",
                headers.iter().collect::<Vec<_>>()
            ),
        },
    };

    let mut records = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let row = result.with_context(|| format!("Failed to read CSV row {}", line + 2))?;

        let question = row.get(question_idx).unwrap_or("").trim();
        let answer = row.get(answer_idx).unwrap_or("").trim();

        if question.is_empty() || answer.is_empty() {
            continue;
        }

        records.push(QnaRecord {
            question: question.to_string(),
            answer: answer.to_string(),
        });
    }

    Ok(records)
}

/// Replace the whole knowledge base in one transaction.
/// Questions are stored canonicalized; canonical duplicates are skipped.
pub fn replace_knowledge_base(conn: &Connection, records: &[QnaRecord]) -> Result<ImportStats> {
    let tx = conn.unchecked_transaction()?;
    let mut stats = ImportStats::default();

    clear_knowledge_entries(&tx)?;

    for record in records {
        match insert_knowledge_entry(&tx, &canonicalize(&record.question), &record.answer) {
            Ok(_) => stats.inserted += 1,
            Err(StoreError::Duplicate(_)) => stats.duplicates += 1,
            Err(e) => return Err(e.into()),
        }
    }

    tx.commit()?;

    tracing::info!(
        inserted = stats.inserted,
        duplicates = stats.duplicates,
        "knowledge base replaced"
    );

    Ok(stats)
}
