use tonic::codec::CompressionEncoding;

/// Trait for configurable gRPC clients
///
/// Every tonic-generated client has these methods, but Rust's orphan rules
/// keep us from implementing an extension trait for them wholesale; callers
/// implement this trait for the client types they hand to
/// [`ChannelHandle::configure`](crate::ChannelHandle::configure) or the
/// helpers below.
pub trait ConfigurableClient: Sized {
    /// Accept compressed responses
    fn accept_compressed(self, encoding: CompressionEncoding) -> Self;

    /// Send compressed requests
    fn send_compressed(self, encoding: CompressionEncoding) -> Self;

    /// Set maximum size for incoming messages
    fn max_decoding_message_size(self, limit: usize) -> Self;

    /// Set maximum size for outgoing messages
    fn max_encoding_message_size(self, limit: usize) -> Self;
}

/// Apply symmetric compression to a client
pub fn with_compression<T>(client: T, encoding: CompressionEncoding) -> T
where
    T: ConfigurableClient,
{
    client.accept_compressed(encoding).send_compressed(encoding)
}

/// Apply message size limits to a client
pub fn with_limits<T>(client: T, max_decoding: usize, max_encoding: usize) -> T
where
    T: ConfigurableClient,
{
    client
        .max_decoding_message_size(max_decoding)
        .max_encoding_message_size(max_encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording {
        accept: Option<CompressionEncoding>,
        send: Option<CompressionEncoding>,
        max_decoding: Option<usize>,
        max_encoding: Option<usize>,
    }

    impl ConfigurableClient for Recording {
        fn accept_compressed(mut self, encoding: CompressionEncoding) -> Self {
            self.accept = Some(encoding);
            self
        }

        fn send_compressed(mut self, encoding: CompressionEncoding) -> Self {
            self.send = Some(encoding);
            self
        }

        fn max_decoding_message_size(mut self, limit: usize) -> Self {
            self.max_decoding = Some(limit);
            self
        }

        fn max_encoding_message_size(mut self, limit: usize) -> Self {
            self.max_encoding = Some(limit);
            self
        }
    }

    #[test]
    fn test_with_compression() {
        let client = with_compression(Recording::default(), CompressionEncoding::Zstd);
        assert_eq!(client.accept, Some(CompressionEncoding::Zstd));
        assert_eq!(client.send, Some(CompressionEncoding::Zstd));
    }

    #[test]
    fn test_with_limits() {
        let client = with_limits(Recording::default(), 4096, 1024);
        assert_eq!(client.max_decoding, Some(4096));
        assert_eq!(client.max_encoding, Some(1024));
    }

    #[test]
    fn test_handle_configure_respects_unset_options() {
        use crate::{ChannelConfig, ChannelFactory};

        // Defaults: no cap, no decompression; the client must be untouched.
        let factory = ChannelFactory::new(ChannelConfig::default()).unwrap();
        let handle =
            tokio_test::block_on(factory.create_channel("address://127.0.0.1:1")).unwrap();
        let client = handle.configure(Recording::default());
        assert_eq!(client.max_decoding, None);
        assert_eq!(client.accept, None);

        let config = ChannelConfig::new()
            .with_max_inbound_message_size(8 * 1024 * 1024)
            .with_full_stream_decompression();
        let factory = ChannelFactory::new(config).unwrap();
        let handle =
            tokio_test::block_on(factory.create_channel("address://127.0.0.1:1")).unwrap();
        let client = handle.configure(Recording::default());
        assert_eq!(client.max_decoding, Some(8 * 1024 * 1024));
        assert_eq!(client.accept, Some(CompressionEncoding::Zstd));
        assert_eq!(client.send, None);
    }
}
