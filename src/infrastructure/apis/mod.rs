pub mod http_reachability_probe;
