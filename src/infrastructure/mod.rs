pub mod js_executor;
pub mod renderer;

pub use js_executor::JsExecutor;
pub use renderer::{eval_as, PageProbe, Renderer, RendererLauncher, Tab};
