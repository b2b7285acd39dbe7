// * ✅ chunk counting and exact output lengths
// * ✅ empty message still yields one data chunk plus the final tag
// * ✅ ordering under parallelism (output identical to single worker)
// * ✅ streaming input with arbitrary read boundaries
// * ✅ tamper, truncation and reordering detection
// * ✅ sink cancellation (abort called, close not called)
// * ✅ pipe reader dropped mid-stream stops the engine
// * ✅ failed close still aborts the sink with the close error
// * ✅ read-ahead and reorder buffer stay within the inflight window

#[cfg(test)]
mod tests {
    use std::io::{self, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use bytes::Bytes;
    use proptest::prelude::*;

    use envelope_core::crypto::{AeadAlgorithm, SymmetricAlgorithm};
    use envelope_core::stream::{
        chunk_size_from_byte, pipe, run_aead, run_aead_buffered, AeadSession, ChunkSink, ChunkSource,
        Direction, MemoryChunkReader, ParallelismProfile, StreamChunkReader,
    };
    use envelope_core::types::EnvelopeError;

    // ------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------
    const KEY: [u8; 16] = [0x42; 16];
    const SALT: [u8; 32] = [0x24; 32];

    fn session(mode: AeadAlgorithm, chunk_size_byte: u8) -> AeadSession {
        AeadSession::integrity_protected(SymmetricAlgorithm::Aes128, mode, chunk_size_byte, &SALT, &KEY).unwrap()
    }

    fn aedp_session(mode: AeadAlgorithm, chunk_size_byte: u8) -> AeadSession {
        let iv = vec![0x5Cu8; mode.nonce_len()];
        AeadSession::aead_encrypted(SymmetricAlgorithm::Aes128, mode, chunk_size_byte, &iv, &KEY).unwrap()
    }

    fn parallel(workers: usize, max_queued_bytes: usize) -> ParallelismProfile {
        ParallelismProfile { workers, max_queued_bytes }
    }

    fn encrypt(plaintext: &[u8], csb: u8, profile: &ParallelismProfile) -> Bytes {
        run_aead_buffered(session(AeadAlgorithm::Gcm, csb), Direction::Encrypt, Bytes::copy_from_slice(plaintext), profile)
            .unwrap()
            .0
    }

    fn decrypt(ciphertext: Bytes, csb: u8, profile: &ParallelismProfile) -> Result<Bytes, EnvelopeError> {
        run_aead_buffered(session(AeadAlgorithm::Gcm, csb), Direction::Decrypt, ciphertext, profile).map(|(pt, _)| pt)
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    /// Reader that hands out at most `step` bytes per call.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.step).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            self.step = self.step % 7 + 1;
            Ok(n)
        }
    }

    /// Sink that fails once `fail_after` chunks were written.
    #[derive(Default)]
    struct FailingSink {
        written: usize,
        fail_after: usize,
        fail_close: bool,
        aborted: Option<String>,
        closed: bool,
    }

    impl ChunkSink for FailingSink {
        fn write_chunk(&mut self, _chunk: Bytes) -> io::Result<()> {
            if self.written == self.fail_after {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.written += 1;
            Ok(())
        }

        fn close(&mut self) -> io::Result<()> {
            if self.fail_close {
                return Err(io::Error::new(io::ErrorKind::Other, "flush failed"));
            }
            self.closed = true;
            Ok(())
        }

        fn abort(&mut self, reason: &EnvelopeError) {
            self.aborted = Some(reason.to_string());
        }
    }

    /// Source that records, at every read, how many chunks were read but not yet written.
    struct TrackedSource {
        inner: MemoryChunkReader,
        reads: usize,
        written: Arc<AtomicUsize>,
        peak_outstanding: Arc<AtomicUsize>,
    }

    impl ChunkSource for TrackedSource {
        fn read_chunk(&mut self, len: usize) -> Result<Bytes, EnvelopeError> {
            self.reads += 1;
            let outstanding = self.reads - self.written.load(Ordering::SeqCst);
            self.peak_outstanding.fetch_max(outstanding, Ordering::SeqCst);
            self.inner.read_chunk(len)
        }

        fn unshift(&mut self, bytes: Bytes) {
            self.inner.unshift(bytes)
        }
    }

    /// Sink that stalls on its first write, then counts writes.
    struct SlowStartSink {
        written: Arc<AtomicUsize>,
        out: Arc<Mutex<Vec<u8>>>,
    }

    impl ChunkSink for SlowStartSink {
        fn write_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
            if self.written.load(Ordering::SeqCst) == 0 {
                thread::sleep(Duration::from_millis(50));
            }
            self.out.lock().unwrap().extend_from_slice(&chunk);
            self.written.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    // ------------------------------------------------------------
    // Framing
    // ------------------------------------------------------------
    #[test]
    fn test_chunk_size_from_byte() {
        assert_eq!(chunk_size_from_byte(0).unwrap(), 64);
        assert_eq!(chunk_size_from_byte(12).unwrap(), 256 * 1024);
        assert_eq!(chunk_size_from_byte(16).unwrap(), 4 * 1024 * 1024);
        assert!(matches!(
            chunk_size_from_byte(17),
            Err(EnvelopeError::ChunkSizeTooLarge { byte: 17, max: 16 })
        ));
    }

    #[test]
    fn test_chunk_counting_200_bytes() {
        let (ct, snapshot) = run_aead_buffered(
            session(AeadAlgorithm::Gcm, 0),
            Direction::Encrypt,
            Bytes::from(sample(200)),
            &ParallelismProfile::single_threaded(),
        )
        .unwrap();

        // 64 + 64 + 64 + 8 plaintext bytes, five tags.
        assert_eq!(ct.len(), 280);
        assert_eq!(snapshot.chunks_data, 4);
        assert_eq!(snapshot.chunks_final, 1);
        assert_eq!(snapshot.bytes_plaintext, 200);
        assert_eq!(snapshot.bytes_overhead, 80);
        assert_eq!(snapshot.output_bytes(), 280);
    }

    #[test]
    fn test_empty_message() {
        let ct = encrypt(&[], 0, &ParallelismProfile::single_threaded());
        assert_eq!(ct.len(), 32);

        let (pt, snapshot) = run_aead_buffered(
            session(AeadAlgorithm::Gcm, 0),
            Direction::Decrypt,
            ct,
            &ParallelismProfile::single_threaded(),
        )
        .unwrap();
        assert!(pt.is_empty());
        assert_eq!(snapshot.chunks_data, 1);
        assert_eq!(snapshot.chunks_final, 1);
    }

    #[test]
    fn test_exact_chunk_multiple() {
        // No trailing partial chunk: two data chunks, then the final tag.
        let ct = encrypt(&sample(128), 0, &ParallelismProfile::single_threaded());
        assert_eq!(ct.len(), 128 + 3 * 16);
        let pt = decrypt(ct, 0, &ParallelismProfile::single_threaded()).unwrap();
        assert_eq!(&pt[..], &sample(128)[..]);
    }

    #[test]
    fn test_round_trip_all_modes_both_families() {
        let plaintext = sample(1000);
        for mode in [AeadAlgorithm::Eax, AeadAlgorithm::Ocb, AeadAlgorithm::Gcm] {
            for make in [session as fn(AeadAlgorithm, u8) -> AeadSession, aedp_session] {
                let profile = parallel(3, 256);
                let (ct, _) = run_aead_buffered(make(mode, 1), Direction::Encrypt, Bytes::from(plaintext.clone()), &profile).unwrap();
                let (pt, _) = run_aead_buffered(make(mode, 1), Direction::Decrypt, ct, &profile).unwrap();
                assert_eq!(&pt[..], &plaintext[..], "{mode:?}");
            }
        }
    }

    // ------------------------------------------------------------
    // Ordering & streaming
    // ------------------------------------------------------------
    #[test]
    fn test_parallel_output_matches_single_worker() {
        let plaintext = sample(64 * 257 + 13);
        let serial = encrypt(&plaintext, 0, &ParallelismProfile::single_threaded());
        for workers in [2, 4, 8] {
            for queued in [1, 100, 10_000] {
                let out = encrypt(&plaintext, 0, &parallel(workers, queued));
                assert_eq!(out, serial, "workers={workers} queued={queued}");

                let pt = decrypt(out, 0, &parallel(workers, queued)).unwrap();
                assert_eq!(&pt[..], &plaintext[..]);
            }
        }
    }

    #[test]
    fn test_stream_source_matches_memory_source() {
        let plaintext = sample(5000);
        let buffered = encrypt(&plaintext, 1, &ParallelismProfile::single_threaded());

        let mut streamed = Vec::new();
        let source = StreamChunkReader::new(Trickle { data: plaintext.clone(), pos: 0, step: 3 });
        run_aead(session(AeadAlgorithm::Gcm, 1), Direction::Encrypt, source, &mut streamed, &parallel(2, 512)).unwrap();
        assert_eq!(&streamed[..], &buffered[..]);

        let mut recovered = Vec::new();
        let source = StreamChunkReader::new(Trickle { data: streamed, pos: 0, step: 5 });
        run_aead(session(AeadAlgorithm::Gcm, 1), Direction::Decrypt, source, &mut recovered, &parallel(2, 512)).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn test_memory_reader_unshift() {
        use envelope_core::stream::ChunkSource;

        let mut reader = MemoryChunkReader::new(Bytes::from_static(b"abcdefgh"));
        let mut first = reader.read_chunk(5).unwrap();
        let tail = first.split_off(3);
        reader.unshift(tail);
        assert_eq!(&first[..], b"abc");
        assert_eq!(&reader.read_chunk(10).unwrap()[..], b"defgh");
        assert!(reader.read_chunk(10).unwrap().is_empty());
    }

    // ------------------------------------------------------------
    // Tampering
    // ------------------------------------------------------------
    #[test]
    fn test_tampered_chunk_reports_index() {
        let ct = encrypt(&sample(200), 0, &ParallelismProfile::single_threaded());
        let mut bad = ct.to_vec();
        bad[2 * 80 + 5] ^= 0x01;

        let err = decrypt(Bytes::from(bad), 0, &parallel(4, 64)).unwrap_err();
        assert!(matches!(err, EnvelopeError::AuthenticationFailure { chunk: 2 }), "{err:?}");
    }

    #[test]
    fn test_tampered_final_tag() {
        let ct = encrypt(&sample(200), 0, &ParallelismProfile::single_threaded());
        let mut bad = ct.to_vec();
        let last = bad.len() - 1;
        bad[last] ^= 0x80;

        let err = decrypt(Bytes::from(bad), 0, &ParallelismProfile::single_threaded()).unwrap_err();
        assert!(matches!(err, EnvelopeError::AuthenticationFailure { chunk: 4 }), "{err:?}");
    }

    #[test]
    fn test_truncation_detected() {
        let ct = encrypt(&sample(200), 0, &ParallelismProfile::single_threaded());
        for cut in [16, 40, 96, 279] {
            let err = decrypt(ct.slice(..ct.len() - cut), 0, &ParallelismProfile::single_threaded()).unwrap_err();
            assert!(err.is_tamper(), "cut={cut}: {err:?}");
        }
    }

    #[test]
    fn test_dropped_trailing_chunk_detected() {
        // Remove the 8-byte data chunk and re-attach the final tag: the final
        // AD then claims 192 bytes while the tag was computed over 200.
        let ct = encrypt(&sample(200), 0, &ParallelismProfile::single_threaded());
        let mut bad = ct[..240].to_vec();
        bad.extend_from_slice(&ct[264..]);
        let err = decrypt(Bytes::from(bad), 0, &ParallelismProfile::single_threaded()).unwrap_err();
        assert!(err.is_tamper(), "{err:?}");
    }

    #[test]
    fn test_swapped_chunks_detected() {
        let ct = encrypt(&sample(200), 0, &ParallelismProfile::single_threaded());
        let mut bad = ct.to_vec();
        let (a, b) = bad.split_at_mut(80);
        a.swap_with_slice(&mut b[..80]);
        let err = decrypt(Bytes::from(bad), 0, &ParallelismProfile::single_threaded()).unwrap_err();
        assert!(matches!(err, EnvelopeError::AuthenticationFailure { chunk: 0 }), "{err:?}");
    }

    #[test]
    fn test_wrong_family_fails() {
        let ct = encrypt(&sample(100), 0, &ParallelismProfile::single_threaded());
        let err = run_aead_buffered(aedp_session(AeadAlgorithm::Gcm, 0), Direction::Decrypt, ct, &ParallelismProfile::single_threaded())
            .unwrap_err();
        assert!(err.is_tamper());
    }

    // ------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------
    #[test]
    fn test_sink_failure_aborts_run() {
        let mut sink = FailingSink { fail_after: 3, ..FailingSink::default() };
        let result = run_aead(
            session(AeadAlgorithm::Ocb, 0),
            Direction::Encrypt,
            MemoryChunkReader::new(Bytes::from(sample(64 * 100))),
            &mut sink,
            &parallel(4, 256),
        );

        assert!(matches!(result, Err(EnvelopeError::Io(_))));
        assert_eq!(sink.written, 3);
        assert!(!sink.closed);
        assert!(sink.aborted.unwrap().contains("disk full"));
    }

    #[test]
    fn test_decrypt_failure_aborts_sink() {
        let ct = encrypt(&sample(200), 0, &ParallelismProfile::single_threaded());
        let mut bad = ct.to_vec();
        bad[90] ^= 1;

        let mut sink = FailingSink { fail_after: usize::MAX, ..FailingSink::default() };
        let result = run_aead(
            session(AeadAlgorithm::Gcm, 0),
            Direction::Decrypt,
            MemoryChunkReader::new(Bytes::from(bad)),
            &mut sink,
            &ParallelismProfile::single_threaded(),
        );
        assert!(matches!(result, Err(EnvelopeError::AuthenticationFailure { chunk: 1 })));
        // Chunk 0 was already released; nothing is rolled back.
        assert_eq!(sink.written, 1);
        assert!(!sink.closed);
        assert!(sink.aborted.is_some());
    }

    #[test]
    fn test_close_failure_aborts_sink() {
        let mut sink = FailingSink { fail_after: usize::MAX, fail_close: true, ..FailingSink::default() };
        let result = run_aead(
            session(AeadAlgorithm::Gcm, 0),
            Direction::Encrypt,
            MemoryChunkReader::new(Bytes::from(sample(200))),
            &mut sink,
            &parallel(2, 256),
        );

        assert!(matches!(result, Err(EnvelopeError::Io(_))));
        assert_eq!(sink.written, 5);
        assert!(!sink.closed);
        assert!(sink.aborted.unwrap().contains("flush failed"));
    }

    #[test]
    fn test_dropped_pipe_reader_stops_engine() {
        let (writer, mut reader) = pipe(1);
        let engine = thread::spawn(move || {
            run_aead(
                session(AeadAlgorithm::Gcm, 0),
                Direction::Encrypt,
                MemoryChunkReader::new(Bytes::from(sample(64 * 1000))),
                writer,
                &parallel(2, 64),
            )
        });

        let mut head = [0u8; 100];
        reader.read_exact(&mut head).unwrap();
        drop(reader);

        let result = engine.join().unwrap();
        match result {
            Err(EnvelopeError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("expected broken pipe, got {other:?}"),
        }
    }

    #[test]
    fn test_pipe_delivers_abort_reason() {
        let ct = encrypt(&sample(300), 0, &ParallelismProfile::single_threaded());
        let mut bad = ct.to_vec();
        bad[250] ^= 4;

        let (writer, mut reader) = pipe(2);
        let engine = thread::spawn(move || {
            run_aead(
                session(AeadAlgorithm::Gcm, 0),
                Direction::Decrypt,
                MemoryChunkReader::new(Bytes::from(bad)),
                writer,
                &ParallelismProfile::single_threaded(),
            )
        });

        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert!(matches!(EnvelopeError::from_io(err), EnvelopeError::AuthenticationFailure { chunk: 3 }));
        assert_eq!(out.len(), 3 * 64);
        assert!(engine.join().unwrap().is_err());
    }

    // ------------------------------------------------------------
    // Backpressure
    // ------------------------------------------------------------
    #[test]
    fn test_stalled_writer_bounds_read_ahead() {
        let plaintext = sample(64 * 300);
        let profile = parallel(4, 4 * (64 + 16));
        let inflight = profile.inflight_chunks(64 + 16);
        assert_eq!(inflight, 4);

        let written = Arc::new(AtomicUsize::new(0));
        let peak_outstanding = Arc::new(AtomicUsize::new(0));
        let out = Arc::new(Mutex::new(Vec::new()));
        let source = TrackedSource {
            inner: MemoryChunkReader::new(Bytes::from(plaintext.clone())),
            reads: 0,
            written: Arc::clone(&written),
            peak_outstanding: Arc::clone(&peak_outstanding),
        };
        let sink = SlowStartSink { written: Arc::clone(&written), out: Arc::clone(&out) };

        let snapshot = run_aead(session(AeadAlgorithm::Gcm, 0), Direction::Encrypt, source, sink, &profile).unwrap();

        assert!(peak_outstanding.load(Ordering::SeqCst) <= inflight);
        assert!(snapshot.peak_reordered_chunks <= inflight as u64);
        assert_eq!(snapshot.tags(), 301);

        let ct = Bytes::from(out.lock().unwrap().clone());
        assert_eq!(&decrypt(ct, 0, &ParallelismProfile::single_threaded()).unwrap()[..], &plaintext[..]);
    }

    #[test]
    fn test_single_slot_window_still_completes() {
        let plaintext = sample(64 * 40 + 3);
        let profile = parallel(4, 1);
        let (ct, snapshot) = run_aead_buffered(
            session(AeadAlgorithm::Ocb, 0),
            Direction::Encrypt,
            Bytes::from(plaintext.clone()),
            &profile,
        )
        .unwrap();
        assert_eq!(snapshot.peak_reordered_chunks, 1);
        let pt = run_aead_buffered(session(AeadAlgorithm::Ocb, 0), Direction::Decrypt, ct, &profile).unwrap().0;
        assert_eq!(&pt[..], &plaintext[..]);
    }

    // ------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_round_trip(
            plaintext in proptest::collection::vec(any::<u8>(), 0..2000),
            csb in 0u8..3,
            workers in 1usize..4,
        ) {
            let profile = parallel(workers, 300);
            let ct = encrypt(&plaintext, csb, &profile);
            let chunk = 64usize << csb;
            let data_chunks = if plaintext.is_empty() { 1 } else { (plaintext.len() + chunk - 1) / chunk };
            prop_assert_eq!(ct.len(), plaintext.len() + (data_chunks + 1) * 16);

            let pt = decrypt(ct, csb, &profile).unwrap();
            prop_assert_eq!(&pt[..], &plaintext[..]);
        }

        #[test]
        fn prop_any_bit_flip_detected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..400),
            pos in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let ct = encrypt(&plaintext, 0, &ParallelismProfile::single_threaded());
            let mut bad = ct.to_vec();
            let i = pos.index(bad.len());
            bad[i] ^= 1 << bit;
            let err = decrypt(Bytes::from(bad), 0, &ParallelismProfile::single_threaded()).unwrap_err();
            prop_assert!(err.is_tamper());
        }
    }
}
