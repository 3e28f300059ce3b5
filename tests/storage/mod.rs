mod document_store;
mod env_store;
