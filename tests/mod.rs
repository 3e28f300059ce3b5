/// Integration tests for opsync
///
/// Tests are organized into logical groupings:
/// - api: upstream clients, tokens and pagination over wiremock servers
/// - storage: secret and document stores on temporary files
mod api;
mod storage;
