//! WASM bindings for textpager.
//!
//! A `TextSession` is meant to live inside a web worker: the page posts the
//! file bytes, then calls one phase at a time and forwards each JSON
//! response. Processing failures come back as `{"type": "error", ...}`
//! responses rather than thrown exceptions.

use textpager_core::prelude::*;
use textpager_core::worker::dispatch;
use wasm_bindgen::prelude::*;

/// Parse session options from JSON; missing fields take their defaults.
fn parse_options(options_json: Option<&str>) -> Result<ProcessingOptions, String> {
    match options_json.map(str::trim) {
        None | Some("") => Ok(ProcessingOptions::default()),
        Some(json) => serde_json::from_str(json).map_err(|e| format!("Invalid options: {}", e)),
    }
}

fn respond(session: &mut ProcessingSession<MemorySource>, request: Request) -> Result<String, String> {
    let response = dispatch(session, request);
    serde_json::to_string(&response).map_err(|e| e.to_string())
}

fn process_all(data: Vec<u8>, file_name: &str, options_json: Option<&str>) -> Result<String, String> {
    let options = parse_options(options_json)?;
    let mut session = ProcessingSession::new(MemorySource::new(file_name, data), options);
    let book = session.run_to_completion().map_err(|e| e.to_string())?;
    serde_json::to_string(&book).map_err(|e| e.to_string())
}

/// One book being processed in the browser.
#[wasm_bindgen]
pub struct TextSession {
    inner: ProcessingSession<MemorySource>,
}

#[wasm_bindgen]
impl TextSession {
    #[wasm_bindgen(constructor)]
    pub fn new(data: Vec<u8>, file_name: &str, options_json: Option<String>) -> Result<TextSession, JsValue> {
        let options = parse_options(options_json.as_deref()).map_err(|e| JsValue::from_str(&e))?;
        Ok(Self {
            inner: ProcessingSession::new(MemorySource::new(file_name, data), options),
        })
    }

    #[wasm_bindgen(js_name = detectMetadata)]
    pub fn detect_metadata(&mut self) -> Result<String, JsValue> {
        self.call(Request::DetectMetadata)
    }

    #[wasm_bindgen(js_name = processInitialChunk)]
    pub fn process_initial_chunk(&mut self) -> Result<String, JsValue> {
        self.call(Request::ProcessInitialChunk)
    }

    #[wasm_bindgen(js_name = processRemainingContent)]
    pub fn process_remaining_content(&mut self) -> Result<String, JsValue> {
        self.call(Request::ProcessRemainingContent)
    }

    #[wasm_bindgen(js_name = generateTitlePage)]
    pub fn generate_title_page(&mut self) -> Result<String, JsValue> {
        self.call(Request::GenerateTitlePage)
    }

    #[wasm_bindgen(js_name = generateEndPage)]
    pub fn generate_end_page(&mut self) -> Result<String, JsValue> {
        self.call(Request::GenerateEndPage)
    }

    #[wasm_bindgen(js_name = assembleBook)]
    pub fn assemble_book(&mut self) -> Result<String, JsValue> {
        self.call(Request::AssembleBook)
    }

    #[wasm_bindgen(js_name = hasRemainingContent)]
    pub fn has_remaining_content(&self) -> bool {
        self.inner.has_remaining_content()
    }

    fn call(&mut self, request: Request) -> Result<String, JsValue> {
        respond(&mut self.inner, request).map_err(|e| JsValue::from_str(&e))
    }
}

/// Run every phase at once. Returns the processed book as JSON.
#[wasm_bindgen(js_name = processText)]
pub fn process_text(data: Vec<u8>, file_name: &str, options_json: Option<String>) -> Result<String, JsValue> {
    process_all(data, file_name, options_json.as_deref()).map_err(|e| JsValue::from_str(&e))
}
