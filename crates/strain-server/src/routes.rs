//! warp filter tree

use crate::handlers;
use std::convert::Infallible;
use std::sync::Arc;
use strain_core::{ContentionRequest, CpuLoadRequest, Lab, MemoryLoadRequest};
use warp::{Filter, Rejection, Reply};

/// Every API route, traced per request
pub fn routes(lab: Arc<Lab>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    contention(Arc::clone(&lab))
        .or(generators(Arc::clone(&lab)))
        .or(dashboards(lab))
        .with(warp::trace::request())
}

fn with_lab(lab: Arc<Lab>) -> impl Filter<Extract = (Arc<Lab>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&lab))
}

fn contention(lab: Arc<Lab>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let load = warp::path!("api" / "contention" / "load")
        .and(warp::post())
        .and(with_lab(Arc::clone(&lab)))
        .and(warp::query::<ContentionRequest>())
        .and_then(handlers::contention_load);

    let metrics = warp::path!("api" / "contention" / "metrics")
        .and(warp::get())
        .and(with_lab(Arc::clone(&lab)))
        .and_then(handlers::contention_metrics);

    let clear = warp::path!("api" / "contention" / "clear")
        .and(warp::delete())
        .and(with_lab(lab))
        .and_then(handlers::contention_clear);

    load.or(metrics).or(clear)
}

fn generators(lab: Arc<Lab>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let cpu_load = warp::path!("api" / "cpu" / "load")
        .and(warp::post())
        .and(with_lab(Arc::clone(&lab)))
        .and(warp::query::<CpuLoadRequest>())
        .and_then(handlers::cpu_load);

    let cpu_stable = warp::path!("api" / "cpu" / "stable")
        .and(warp::get())
        .and(with_lab(Arc::clone(&lab)))
        .and_then(handlers::cpu_stable);

    let mem_load = warp::path!("api" / "mem" / "load")
        .and(warp::post())
        .and(with_lab(Arc::clone(&lab)))
        .and(warp::query::<MemoryLoadRequest>())
        .and_then(handlers::memory_load);

    let mem_stable = warp::path!("api" / "mem" / "stable")
        .and(warp::get())
        .and(with_lab(Arc::clone(&lab)))
        .and_then(handlers::memory_stable);

    let data_clear = warp::path!("api" / "data" / "clear")
        .and(warp::delete())
        .and(with_lab(lab))
        .and_then(handlers::data_clear);

    cpu_load
        .or(cpu_stable)
        .or(mem_load)
        .or(mem_stable)
        .or(data_clear)
}

fn dashboards(lab: Arc<Lab>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let system = warp::path!("api" / "metrics" / "system")
        .and(warp::get())
        .and(with_lab(lab))
        .and_then(handlers::system_metrics);

    let endpoints = warp::path!("api" / "metrics" / "endpoints")
        .and(warp::get())
        .and_then(handlers::endpoint_metrics);

    system.or(endpoints)
}
