use super::Expr;

impl Expr {
    /// Compute `self + f * rhs`. A 1x1 operand is broadcast to the shape of the other operand.
    pub fn add_scaled(self, rhs : Expr, f : f64) -> Result<Expr,String> {
        let shape =
            if self.shape == rhs.shape || rhs.is_scalar() { self.shape }
            else if self.is_scalar() { rhs.shape }
            else {
                return Err(format!("Mismatching shapes for addition: {:?} and {:?}",self.shape,rhs.shape));
            };
        let lhs = self.broadcast(shape)?;
        let rhs = rhs.broadcast(shape)?;

        let mut aptr  = Vec::with_capacity(lhs.aptr.len());
        let mut asubj = Vec::with_capacity(lhs.asubj.len()+rhs.asubj.len());
        let mut acof  = Vec::with_capacity(lhs.asubj.len()+rhs.asubj.len());
        aptr.push(0);
        for ((lj,lc),(rj,rc)) in lhs.elements().zip(rhs.elements()) {
            asubj.extend_from_slice(lj);
            asubj.extend_from_slice(rj);
            acof.extend_from_slice(lc);
            acof.extend(rc.iter().map(|c| c*f));
            aptr.push(asubj.len());
        }
        Ok(Expr{ shape, aptr, asubj, acof }.eval_finalize())
    }

    pub fn add(self, rhs : Expr) -> Result<Expr,String> { self.add_scaled(rhs,1.0) }
    pub fn sub(self, rhs : Expr) -> Result<Expr,String> { self.add_scaled(rhs,-1.0) }

    pub fn mul_scalar(mut self, f : f64) -> Expr {
        self.acof.iter_mut().for_each(|c| *c *= f);
        self.eval_finalize()
    }

    pub fn neg(self) -> Expr { self.mul_scalar(-1.0) }
}
