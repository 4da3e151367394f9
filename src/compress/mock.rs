use super::{CompressionOptions, ImageCompressor};
use crate::models::SourceFile;
use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockImageCompressor {
    calls: Arc<Mutex<Vec<CompressionOptions>>>,
    output: Arc<Mutex<Option<Vec<u8>>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockImageCompressor {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            output: Arc::new(Mutex::new(None)),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    /// Return these bytes instead of echoing the input.
    pub fn with_output(self, output: Vec<u8>) -> Self {
        *self.output.lock().unwrap() = Some(output);
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn get_calls(&self) -> Vec<CompressionOptions> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockImageCompressor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageCompressor for MockImageCompressor {
    async fn compress(&self, file: &SourceFile, options: &CompressionOptions) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(options.clone());

        if *self.should_fail.lock().unwrap() {
            return Err(crate::Error::Image(image::ImageError::IoError(
                std::io::Error::other("Mock failure"),
            )));
        }

        Ok(self
            .output
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| file.bytes.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_input() {
        let compressor = MockImageCompressor::new();
        let file = SourceFile::new("a.png", b"fake image data".to_vec());

        let output = compressor
            .compress(&file, &CompressionOptions::default())
            .await
            .unwrap();

        assert_eq!(output, b"fake image data");
        assert_eq!(compressor.get_call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_with_output_records_options() {
        let compressor = MockImageCompressor::new().with_output(vec![9, 9]);
        let file = SourceFile::new("a.png", vec![1]);
        let options = CompressionOptions {
            max_width_or_height: Some(42),
            ..CompressionOptions::default()
        };

        let output = compressor.compress(&file, &options).await.unwrap();

        assert_eq!(output, vec![9, 9]);
        assert_eq!(compressor.get_calls(), vec![options]);
    }

    #[tokio::test]
    async fn test_mock_with_failure() {
        let compressor = MockImageCompressor::new().with_failure(true);
        let file = SourceFile::new("a.png", vec![1]);

        let result = compressor
            .compress(&file, &CompressionOptions::default())
            .await;
        assert!(result.is_err());
        assert_eq!(compressor.get_call_count(), 1);
    }
}
