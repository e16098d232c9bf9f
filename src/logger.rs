use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{info, warn};
use std::rc::Rc;
use std::time::Instant;

use crate::auth::AuthFailure;

/// 요청 로깅 미들웨어
/// Logs each request and its outcome. Token values are never logged; when
/// token validation failed, the recorded failure reason is.
pub struct LoggerMiddleware {
    token_header: Rc<str>,
}

impl LoggerMiddleware {
    pub fn new(token_header: &str) -> Self {
        Self {
            token_header: Rc::from(token_header),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
            token_header: self.token_header.clone(),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
    token_header: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let has_token = req.headers().contains_key(&*self.token_header);

        info!("Request started: {} {} (token present: {})", method, path, has_token);

        let service = self.service.clone();

        Box::pin(async move {
            let res = service.call(req).await?;

            let elapsed = start_time.elapsed();
            let status = res.status();
            let failure = res.request().extensions().get::<AuthFailure>().copied();

            match failure {
                Some(failure) => warn!(
                    "Request rejected: {} {} - Status: {} - {} ({}ms)",
                    method,
                    path,
                    status.as_u16(),
                    failure.reason(),
                    elapsed.as_millis()
                ),
                None => info!(
                    "Request completed: {} {} - Status: {} ({}ms)",
                    method,
                    path,
                    status.as_u16(),
                    elapsed.as_millis()
                ),
            }

            Ok(res)
        })
    }
}
