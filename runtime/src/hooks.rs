//! Ready-made queries and mutations for the fraud-analysis endpoints.

use loanguard_core::{FeatureMap, MultipartForm};

use crate::context::AppContext;
use crate::mutation::Mutation;
use crate::query::Query;

pub const HEALTH_KEY: &str = "health";

/// Backend health, cached under `"health"`.
pub fn health_query(ctx: &AppContext) -> Query {
    let api = ctx.api().clone();
    Query::new(ctx.cache().clone(), HEALTH_KEY, move || {
        let api = api.clone();
        async move { api.health().await }
    })
}

pub fn upload_mutation(ctx: &AppContext) -> Mutation<MultipartForm> {
    let api = ctx.api().clone();
    Mutation::new(move |form: MultipartForm| {
        let api = api.clone();
        async move { api.upload(form).await }
    })
}

pub fn analyze_mouse_mutation(ctx: &AppContext) -> Mutation<FeatureMap> {
    let api = ctx.api().clone();
    Mutation::new(move |features: FeatureMap| {
        let api = api.clone();
        async move { api.analyze_mouse(&features).await }
    })
}

pub fn analyze_keyboard_mutation(ctx: &AppContext) -> Mutation<FeatureMap> {
    let api = ctx.api().clone();
    Mutation::new(move |features: FeatureMap| {
        let api = api.clone();
        async move { api.analyze_keyboard(&features).await }
    })
}

pub fn analyze_fingerprint_mutation(ctx: &AppContext) -> Mutation<FeatureMap> {
    let api = ctx.api().clone();
    Mutation::new(move |features: FeatureMap| {
        let api = api.clone();
        async move { api.analyze_fingerprint(&features).await }
    })
}
