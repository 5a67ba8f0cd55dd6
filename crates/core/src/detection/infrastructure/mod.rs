pub mod execution_provider;
pub mod histogram_embedder;
pub mod onnx_arcface_embedder;
pub mod onnx_blazeface_detector;
pub mod template_verifier;
