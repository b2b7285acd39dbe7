#[cfg(test)]
mod tests {
    use envelope_core::config::Config;
    use envelope_core::crypto::AeadAlgorithm;
    use envelope_core::stream::ParallelismProfile;
    use envelope_core::types::EnvelopeError;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.aead_protect);
        assert_eq!(config.preferred_aead_algorithm, AeadAlgorithm::Gcm);
        assert_eq!(config.aead_chunk_size_byte, 12);
        assert_eq!(config.max_aead_chunk_size_byte, 16);
        assert!(!config.allow_unauthenticated_stream);
        assert_eq!(config.workers, 1);
        assert_eq!(config.max_queued_bytes, 4 * 1024 * 1024);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json() {
        let config = Config::from_json(r#"{ "aead_protect": true, "preferred_aead_algorithm": "ocb", "workers": 4 }"#).unwrap();
        assert!(config.aead_protect);
        assert_eq!(config.preferred_aead_algorithm, AeadAlgorithm::Ocb);
        assert_eq!(config.workers, 4);
        assert_eq!(config.aead_chunk_size_byte, 12);
    }

    #[test]
    fn test_json_round_trip() {
        let config = Config { aead_protect: true, aead_chunk_size_byte: 3, ..Config::default() };
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(Config::from_json(&text).unwrap(), config);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Config::from_json(r#"{ "aead_protekt": true }"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let err = Config::from_json(r#"{ "preferred_aead_algorithm": "siv" }"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidConfig(_)));
    }

    #[test]
    fn test_validation() {
        let bad = [
            Config { max_aead_chunk_size_byte: 17, ..Config::default() },
            Config { aead_chunk_size_byte: 10, max_aead_chunk_size_byte: 8, ..Config::default() },
            Config { workers: 0, ..Config::default() },
            Config { workers: 65, ..Config::default() },
            Config { max_queued_bytes: 0, ..Config::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(EnvelopeError::InvalidConfig(_))), "{config:?}");
        }
    }

    #[test]
    fn test_parallelism_profile_from_config() {
        let config = Config { workers: 3, max_queued_bytes: 1000, ..Config::default() };
        let profile = ParallelismProfile::from(&config);
        assert_eq!(profile.workers, 3);
        // 1000 / (64 + 16) = 12 chunks in flight.
        assert_eq!(profile.inflight_chunks(80), 12);
        // Never zero, even when one chunk exceeds the budget.
        assert_eq!(profile.inflight_chunks(4096), 1);

        let dynamic = ParallelismProfile::dynamic(1 << 20);
        assert!(dynamic.workers >= 1);
    }
}
