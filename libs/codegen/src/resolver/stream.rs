//! Chunking semantics shared by every generated client
//!
//! The emitters render these algorithms in their target language; the Rust
//! versions here are the reference they are tested against.

use crate::error::StreamError;

/// Reassembles a stream-out from the chunks the device sends.
#[derive(Debug, Clone)]
pub struct StreamOutAssembler<T> {
    chunk_cardinality: usize,
    fixed_length: Option<usize>,
    single_chunk: bool,
    total: Option<usize>,
    data: Vec<T>,
    complete: bool,
}

impl<T: Clone> StreamOutAssembler<T> {
    pub fn new(chunk_cardinality: usize, fixed_length: Option<usize>, single_chunk: bool) -> Self {
        Self {
            chunk_cardinality,
            fixed_length,
            single_chunk,
            total: fixed_length,
            data: Vec::new(),
            complete: false,
        }
    }

    /// Feed one chunk.
    ///
    /// `length` is the wire-carried total of this response (ignored for
    /// fixed-length streams), `offset` the chunk offset (ignored for single
    /// chunks). Returns the payload once the stream is complete.
    pub fn push(
        &mut self,
        length: Option<usize>,
        offset: usize,
        chunk: &[T],
    ) -> Result<Option<Vec<T>>, StreamError> {
        if self.complete {
            return Err(StreamError::AlreadyComplete);
        }

        if self.fixed_length.is_none() {
            if let Some(current) = length {
                match self.total {
                    Some(previous) if previous != current => {
                        return Err(StreamError::LengthChanged { previous, current })
                    }
                    _ => self.total = Some(current),
                }
            }
        }

        if self.single_chunk {
            let take = self
                .total
                .unwrap_or(chunk.len())
                .min(chunk.len())
                .min(self.chunk_cardinality);
            self.data.extend_from_slice(&chunk[..take]);
            return Ok(Some(self.finish()));
        }

        if offset != self.data.len() {
            return Err(StreamError::OutOfSync {
                expected: self.data.len(),
                actual: offset,
            });
        }

        let mut take = chunk.len().min(self.chunk_cardinality);
        if let Some(total) = self.total {
            take = take.min(total.saturating_sub(self.data.len()));
        }
        self.data.extend_from_slice(&chunk[..take]);

        let done = match self.total {
            Some(total) => self.data.len() >= total,
            // Without a known total a short chunk is the last one.
            None => chunk.len() < self.chunk_cardinality,
        };

        if done {
            Ok(Some(self.finish()))
        } else {
            Ok(None)
        }
    }

    /// Drop everything received so far, e.g. after an out-of-sync chunk.
    pub fn reset(&mut self) {
        self.total = self.fixed_length;
        self.data.clear();
        self.complete = false;
    }

    pub fn received(&self) -> usize {
        self.data.len()
    }

    fn finish(&mut self) -> Vec<T> {
        self.complete = true;
        std::mem::take(&mut self.data)
    }
}

/// One low-level call of a stream-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<T> {
    pub offset: usize,
    pub data: Vec<T>,
}

/// Splits a caller's array into fixed-size chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInPlan {
    chunk_cardinality: usize,
    max_length: usize,
    single_chunk: bool,
}

impl StreamInPlan {
    pub fn new(chunk_cardinality: usize, max_length: usize, single_chunk: bool) -> Self {
        let max_length = if single_chunk {
            max_length.min(chunk_cardinality)
        } else {
            max_length
        };

        Self {
            chunk_cardinality,
            max_length,
            single_chunk,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Number of low-level calls needed for `length` items.
    pub fn chunk_count(&self, length: usize) -> usize {
        length.div_ceil(self.chunk_cardinality).max(1)
    }

    /// Split `data` into `ceil(len / cardinality)` chunks, zero-padding the
    /// last one. Empty input still produces one chunk so the device observes
    /// the zero length.
    pub fn split<T: Clone + Default>(&self, data: &[T]) -> Result<Vec<Chunk<T>>, StreamError> {
        if data.len() > self.max_length {
            return Err(StreamError::TooLong {
                length: data.len(),
                max: self.max_length,
            });
        }

        let mut chunks = Vec::with_capacity(self.chunk_count(data.len()));
        let mut offset = 0;

        loop {
            let end = (offset + self.chunk_cardinality).min(data.len());
            let mut chunk = data[offset..end].to_vec();
            chunk.resize(self.chunk_cardinality, T::default());
            chunks.push(Chunk {
                offset,
                data: chunk,
            });

            offset += self.chunk_cardinality;
            if offset >= data.len() || self.single_chunk {
                break;
            }
        }

        Ok(chunks)
    }
}

/// Collects the responses of all low-level calls of a stream-in and insists
/// they agree.
#[derive(Debug, Clone)]
pub struct StreamInResults<R> {
    result: Option<R>,
    chunks: usize,
}

impl<R: PartialEq> Default for StreamInResults<R> {
    fn default() -> Self {
        Self {
            result: None,
            chunks: 0,
        }
    }
}

impl<R: PartialEq> StreamInResults<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: R) -> Result<(), StreamError> {
        let chunk = self.chunks;
        self.chunks += 1;

        match &self.result {
            Some(previous) if *previous != result => {
                Err(StreamError::InconsistentResults { chunk })
            }
            Some(_) => Ok(()),
            None => {
                self.result = Some(result);
                Ok(())
            }
        }
    }

    pub fn finish(self) -> Option<R> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed<T: Clone>(
        assembler: &mut StreamOutAssembler<T>,
        length: Option<usize>,
        payload: &[T],
        cardinality: usize,
        pad: T,
    ) -> Vec<T> {
        let mut offset = 0;
        loop {
            let end = (offset + cardinality).min(payload.len());
            let mut chunk = payload[offset..end].to_vec();
            chunk.resize(cardinality, pad.clone());
            if let Some(done) = assembler.push(length, offset, &chunk).unwrap() {
                return done;
            }
            offset += cardinality;
        }
    }

    #[test]
    fn reassembles_wire_length_stream() {
        let payload: Vec<u8> = (0..150).collect();
        let mut assembler = StreamOutAssembler::new(60, None, false);
        let result = feed(&mut assembler, Some(payload.len()), &payload, 60, 0);
        assert_eq!(result, payload);
    }

    #[test]
    fn reassembles_fixed_length_stream() {
        let payload: Vec<i16> = (0..100).map(|v| v * 3 - 50).collect();
        let mut assembler = StreamOutAssembler::new(30, Some(100), false);
        let result = feed(&mut assembler, None, &payload, 30, 0);
        assert_eq!(result, payload);
    }

    #[test]
    fn wire_length_wins_over_short_chunk() {
        let mut assembler = StreamOutAssembler::new(4, None, false);
        assert_eq!(assembler.push(Some(6), 0, &[1, 2]).unwrap(), None);
        assert_eq!(
            assembler.push(Some(6), 2, &[3, 4, 5, 6]).unwrap(),
            Some(vec![1, 2, 3, 4, 5, 6])
        );
    }

    #[test]
    fn short_chunk_ends_stream_without_length() {
        let mut assembler = StreamOutAssembler::new(4, None, false);
        assert_eq!(assembler.push(None, 0, &[1, 2, 3, 4]).unwrap(), None);
        assert_eq!(assembler.push(None, 4, &[5]).unwrap(), Some(vec![1, 2, 3, 4, 5]));
    }

    #[test]
    fn single_chunk_truncates_to_wire_length() {
        let mut assembler = StreamOutAssembler::new(12, None, true);
        let chunk = [3u8, 7, 19, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(assembler.push(Some(3), 0, &chunk).unwrap(), Some(vec![3, 7, 19]));
        assert_eq!(assembler.push(Some(3), 0, &chunk), Err(StreamError::AlreadyComplete));
    }

    #[test]
    fn single_chunk_completes_when_wire_length_exceeds_chunk() {
        let mut assembler = StreamOutAssembler::new(4, None, true);
        assert_eq!(
            assembler.push(Some(10), 0, &[1u8, 2, 3, 4]).unwrap(),
            Some(vec![1, 2, 3, 4])
        );
    }

    #[test]
    fn detects_out_of_sync_chunks() {
        let mut assembler = StreamOutAssembler::new(4, None, false);
        assembler.push(Some(10), 0, &[1, 2, 3, 4]).unwrap();
        assert_eq!(
            assembler.push(Some(10), 8, &[9, 10, 0, 0]),
            Err(StreamError::OutOfSync { expected: 4, actual: 8 })
        );
        assembler.reset();
        assert_eq!(assembler.received(), 0);
    }

    #[test]
    fn detects_changing_length() {
        let mut assembler = StreamOutAssembler::new(2, None, false);
        assembler.push(Some(4), 0, &[1, 2]).unwrap();
        assert_eq!(
            assembler.push(Some(5), 2, &[3, 4]),
            Err(StreamError::LengthChanged { previous: 4, current: 5 })
        );
    }

    #[test]
    fn split_pads_last_chunk() {
        let plan = StreamInPlan::new(4, 100, false);
        let data: Vec<u8> = (1..=10).collect();
        let chunks = plan.split(&data).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.len(), data.len().div_ceil(4));
        assert_eq!(chunks[2], Chunk { offset: 8, data: vec![9, 10, 0, 0] });
        assert!(chunks.iter().all(|c| c.data.len() == 4));
    }

    #[test]
    fn split_rejects_oversized_input() {
        let plan = StreamInPlan::new(4, 6, false);
        assert_eq!(
            plan.split(&[0u8; 7]),
            Err(StreamError::TooLong { length: 7, max: 6 })
        );
        let single = StreamInPlan::new(4, 100, true);
        assert_eq!(single.max_length(), 4);
    }

    #[test]
    fn split_of_empty_input_sends_one_chunk() {
        let plan = StreamInPlan::new(3, 10, false);
        let chunks = plan.split::<char>(&[]).unwrap();
        assert_eq!(chunks, vec![Chunk { offset: 0, data: vec!['\0'; 3] }]);
    }

    #[test]
    fn results_must_agree() {
        let mut results = StreamInResults::new();
        results.push((1u8, true)).unwrap();
        results.push((1u8, true)).unwrap();
        assert_eq!(results.push((2u8, true)), Err(StreamError::InconsistentResults { chunk: 2 }));
        assert_eq!(results.finish(), Some((1, true)));
    }
}
