use serde::{ Serialize, Deserialize };
use uuid::Uuid;

use crate::entities::owner::Requester;
use crate::errors::AuthError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn requester(&self) -> Result<Requester, AuthError> {
        let owner_id = Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidUserId)?;
        Ok(Requester::new(owner_id, self.role.clone()))
    }
}
