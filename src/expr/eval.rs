// Normalization of expressions: terms are sorted by subscript within each element, duplicate
// subscripts are merged and zero coefficients removed.

use super::Expr;
use itertools::izip;

impl Expr {
    pub fn eval_finalize(self) -> Expr {
        let (shape,aptr,asubj,acof) = self.dissolve();
        let mut rptr  = Vec::with_capacity(aptr.len());
        let mut rsubj = Vec::with_capacity(asubj.len());
        let mut rcof  = Vec::with_capacity(acof.len());
        let mut perm : Vec<usize> = Vec::new();
        rptr.push(0);

        for (&p0,&p1) in izip!(aptr.iter(),aptr[1..].iter()) {
            perm.clear();
            perm.extend(p0..p1);
            perm.sort_by_key(|&i| asubj[i]);

            let start = rsubj.len();
            for &i in perm.iter() {
                let (j,c) = (asubj[i],acof[i]);
                if rsubj.len() > start && rsubj[rsubj.len()-1] == j {
                    if let Some(last) = rcof.last_mut() { *last += c; }
                }
                else {
                    rsubj.push(j);
                    rcof.push(c);
                }
            }
            // drop cancelled terms
            let mut k = start;
            for i in start..rsubj.len() {
                if rcof[i] != 0.0 {
                    rsubj[k] = rsubj[i];
                    rcof[k] = rcof[i];
                    k += 1;
                }
            }
            rsubj.truncate(k);
            rcof.truncate(k);
            rptr.push(k);
        }

        Expr{ shape, aptr : rptr, asubj : rsubj, acof : rcof }
    }
}
