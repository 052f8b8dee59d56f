pub(crate) mod ai_grading;
pub(crate) mod analytics;
pub(crate) mod collaborators;
pub(crate) mod datalab_ocr;
pub(crate) mod events;
pub(crate) mod llm_json;
pub(crate) mod scoring;
pub(crate) mod worksheets;
