//! Search endpoint handler
//!
//! Request admission, cache lookup, retrieval, summarization and cache
//! store - the whole query-time pipeline lives behind this one endpoint.

use axum::{
  extract::{Extension, Json, State},
  http::StatusCode,
  response::Json as ResponseJson,
};
use std::sync::Arc;
use std::time::Instant;

use crate::server::middleware::RequestContext;
use crate::server::server::AppState;
use crate::server::services::response_cache::CachedSearch;
use crate::server::services::retriever::RetrievalError;
use crate::server::types::{
  resolve_max_results, ErrorResponse, ProductResult, SearchMetadata, SearchRequest,
  SearchResponse, MAX_QUERY_LENGTH, MIN_QUERY_LENGTH,
};

type SearchResult =
  Result<ResponseJson<SearchResponse>, (StatusCode, ResponseJson<ErrorResponse>)>;

/// POST /search - Semantic catalog search with a synthesized summary
pub async fn search(
  State(state): State<Arc<AppState>>,
  Extension(context): Extension<RequestContext>,
  Json(request): Json<SearchRequest>,
) -> SearchResult {
  // Admission first: a rejected request does no retrieval work at all
  if !state.rate_limiter.allow(&context.client) {
    context.log_warn(&format!("Rate limit exceeded for {}", context.client), "search-api").await;
    return Err((
      StatusCode::TOO_MANY_REQUESTS,
      ResponseJson(ErrorResponse::single(
        "rate_limited",
        "Rate limit exceeded. Please try again later.",
      )),
    ));
  }

  let query = request.query.trim().to_string();
  if query.len() < MIN_QUERY_LENGTH || query.len() > MAX_QUERY_LENGTH {
    return Err((
      StatusCode::BAD_REQUEST,
      ResponseJson(ErrorResponse::single(
        "invalid_query",
        &format!("Query must be between {MIN_QUERY_LENGTH} and {MAX_QUERY_LENGTH} characters"),
      )),
    ));
  }

  let k = resolve_max_results(request.max_results);
  let started = Instant::now();

  if let Some(cached) = state.cache.get(&query, k) {
    context.log_info(&format!("Cache hit for '{query}' (k={k})"), "search-api").await;
    return Ok(build_response(&state, &context, cached, k, true, started).await);
  }

  let retrieval = match state.retriever.search(&query, k).await {
    Ok(retrieval) => retrieval,
    Err(RetrievalError::Timeout(budget)) => {
      context
        .log_warn(&format!("Retrieval timed out after {budget:?} for '{query}'"), "search-api")
        .await;
      return Err((
        StatusCode::SERVICE_UNAVAILABLE,
        ResponseJson(ErrorResponse::single(
          "retrieval_timeout",
          "Retrieval timed out. Please retry shortly.",
        )),
      ));
    }
    Err(RetrievalError::Internal(e)) => {
      context.log_error(&format!("Search failed for '{query}': {e}"), "search-api").await;
      return Err((
        StatusCode::INTERNAL_SERVER_ERROR,
        ResponseJson(ErrorResponse::single("search_failed", &format!("Search failed: {e}"))),
      ));
    }
  };

  let summary = state.summarizer.summarize(&query, &retrieval.matches).await;

  // Cache only the fully-assembled response; an aborted request leaves no
  // partial entry behind
  let cached = CachedSearch { matches: retrieval.matches, summary };
  state.cache.put(&query, k, cached.clone());

  context
    .log_info(
      &format!("Search for '{query}' returned {} results", cached.matches.len()),
      "search-api",
    )
    .await;

  Ok(build_response(&state, &context, cached, k, false, started).await)
}

/// Assemble the response envelope around a computed (or cached) result
async fn build_response(
  state: &AppState,
  context: &RequestContext,
  cached: CachedSearch,
  k: usize,
  cache_hit: bool,
  started: Instant,
) -> ResponseJson<SearchResponse> {
  let products: Vec<ProductResult> = cached.matches.iter().map(ProductResult::from_match).collect();

  let total_index_size = match state.retriever.count().await {
    Ok(count) => count,
    Err(e) => {
      context.log_warn(&format!("Failed to read index size: {e}"), "search-api").await;
      products.len()
    }
  };

  let metadata = SearchMetadata {
    execution_time_ms: started.elapsed().as_secs_f64() * 1000.0,
    cache_hit,
    total_index_size,
    k,
    results_count: products.len(),
  };

  ResponseJson(SearchResponse { products, summary: cached.summary, metadata })
}
