//! Size-bounded chunking of ordered record sequences. Greedy single-pass
//! bin packing: records stay in original order, chunk boundaries are
//! deterministic, and a record is never split across chunks.

use serde_json::Value;

use crate::core::types::PipelineError;

/// Splits `rows` into ordered chunks whose accumulated serialized size stays
/// within `budget_bytes`. A single record larger than the budget gets a
/// chunk of its own. Size is measured on the canonical serialized form of
/// each record, matching exactly what gets persisted. Empty input yields
/// zero chunks.
pub fn chunk_rows(rows: Vec<Value>, budget_bytes: usize) -> Result<Vec<Vec<Value>>, PipelineError> {
    let mut chunks: Vec<Vec<Value>> = Vec::new();
    let mut current: Vec<Value> = Vec::new();
    let mut accumulated = 0usize;

    for row in rows {
        let size = serialized_size(&row)?;
        if !current.is_empty() && accumulated + size > budget_bytes {
            chunks.push(std::mem::take(&mut current));
            accumulated = 0;
        }
        accumulated += size;
        current.push(row);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}

/// Total serialized size of a dataset, used to decide between inline and
/// chunked storage.
pub fn serialized_size<T: serde::Serialize>(value: &T) -> Result<usize, PipelineError> {
    serde_json::to_vec(value)
        .map(|bytes| bytes.len())
        .map_err(|e| PipelineError::Derivation(format!("unable to serialize record: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixed_rows(count: usize, pad: usize) -> Vec<Value> {
        (0..count)
            .map(|i| json!({ "idx": format!("{:06}", i), "pad": "a".repeat(pad) }))
            .collect()
    }

    #[test]
    fn test_reassembly_is_exact() {
        let rows = fixed_rows(50, 100);
        let chunks = chunk_rows(rows.clone(), 1000).unwrap();
        let reassembled: Vec<Value> = chunks.into_iter().flatten().collect();
        assert_eq!(reassembled, rows);
    }

    #[test]
    fn test_chunks_respect_budget() {
        let rows = fixed_rows(50, 100);
        let row_size = serialized_size(&rows[0]).unwrap();
        let budget = row_size * 7;
        for chunk in chunk_rows(rows, budget).unwrap() {
            let total: usize = chunk
                .iter()
                .map(|r| serialized_size(r).unwrap())
                .sum();
            assert!(total <= budget);
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn test_oversized_record_gets_own_chunk() {
        let rows = vec![
            json!({ "small": 1 }),
            json!({ "huge": "x".repeat(500) }),
            json!({ "small": 2 }),
        ];
        let chunks = chunk_rows(rows.clone(), 100).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].len(), 1);
        let reassembled: Vec<Value> = chunks.into_iter().flatten().collect();
        assert_eq!(reassembled, rows);
    }

    #[test]
    fn test_empty_input_yields_zero_chunks() {
        assert!(chunk_rows(vec![], 1000).unwrap().is_empty());
    }

    #[test]
    fn test_deterministic_boundaries() {
        let rows = fixed_rows(200, 50);
        let a = chunk_rows(rows.clone(), 1234).unwrap();
        let b = chunk_rows(rows, 1234).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_larger_budget_never_increases_chunk_count() {
        let rows = fixed_rows(100, 64);
        let mut previous = usize::MAX;
        for budget in [200, 400, 800, 1600, 3200, 6400, 1 << 20] {
            let count = chunk_rows(rows.clone(), budget).unwrap().len();
            assert!(count <= previous, "budget {} grew chunk count", budget);
            previous = count;
        }
    }

    #[test]
    fn test_exact_fit_boundary() {
        // Budget equal to exactly three rows: the fourth row opens a new chunk.
        let rows = fixed_rows(7, 20);
        let row_size = serialized_size(&rows[0]).unwrap();
        let chunks = chunk_rows(rows, row_size * 3).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 3);
        assert_eq!(chunks[1].len(), 3);
        assert_eq!(chunks[2].len(), 1);
    }
}
